pub mod product;
pub mod inventory;

pub use product::{ProductCatalog, ProductError};
pub use inventory::{InventoryError, StockLedger};

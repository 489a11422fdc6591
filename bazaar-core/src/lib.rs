pub mod money;
pub mod product;
pub mod order;
pub mod ledger;
pub mod notification;
pub mod identity;
pub mod payment;
pub mod repository;

pub use money::Money;
pub use product::Product;
pub use order::{Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, Tracking};
pub use ledger::{AccountDelta, AdminCommissionAccount, SellerAccount, Transaction, TransactionStatus};
pub use notification::{Notification, NotificationKind};
pub use identity::{Actor, Role};
pub use payment::{GatewayStatus, PaymentCallback};
pub use repository::{StoreError, StoreResult};

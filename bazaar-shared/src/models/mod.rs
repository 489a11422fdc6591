pub mod events;

pub use events::NotificationEnvelope;

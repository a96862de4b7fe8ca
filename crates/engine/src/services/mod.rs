//! Services orchestrating the engine's business flows.

pub mod email;
pub mod fulfillment;
pub mod notify;
pub mod recurring;
pub mod schedule_sync;

pub use email::EmailSink;
pub use fulfillment::{DocumentCreated, FulfillmentService, ShipmentDocument, TrackingUpdate};
pub use notify::{Notification, NotificationSink, Notifier};
pub use recurring::{InvoicePaid, RecurringBillingService};
pub use schedule_sync::{ScheduleSyncService, SyncReport};

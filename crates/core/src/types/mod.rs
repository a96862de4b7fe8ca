//! Domain types shared across Terroir components.

mod customer;
mod discount;
mod order;
mod schedule;
mod status;

pub use customer::{Customer, ShippingMethod, ShippingPreference, SubscriptionState};
pub use discount::{Discount, DiscountKind};
pub use order::{Address, Destination, LineItem, Order, OrderMetadata, RelayDescriptor};
pub use schedule::{SchedulePhase, ScheduleStatus};
pub use status::{FulfillmentStatus, OrderStatus, PaymentStatus, UnknownStatus};

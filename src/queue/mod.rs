pub mod store;

pub use store::{Delivery, QueueError, WorkQueue};

pub mod model;

pub use model::{DeliveryMode, Schedule};

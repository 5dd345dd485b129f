pub mod model;
pub mod render;
pub mod service;

pub use model::{DeliveryObligation, ObligationStatus};
pub use render::render_message;
pub use service::{DeliveryOutcome, DeliveryService};

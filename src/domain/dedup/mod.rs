pub mod service;

pub use service::{DedupScope, DedupService};

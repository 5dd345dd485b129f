pub mod service;

pub use service::{BlackoutParams, SettingsService};

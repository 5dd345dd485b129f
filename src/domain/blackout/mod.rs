pub mod gate;

pub use gate::{BlackoutGate, BlackoutStatus, Clock, SystemClock};

pub mod feed;
pub mod health;
pub mod schedule;

pub use feed::FeedController;
pub use schedule::ScheduleController;

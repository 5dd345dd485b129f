pub mod feed_item_repository;
pub mod feed_repository;
pub mod obligation_repository;
pub mod schedule_repository;
pub mod settings_repository;

pub use feed_item_repository::FeedItemRepository;
pub use feed_repository::FeedRepository;
pub use obligation_repository::{NewObligation, ObligationCounts, ObligationRepository};
pub use schedule_repository::ScheduleRepository;
pub use settings_repository::SettingsRepository;

pub mod diff;
pub mod model;

pub use diff::{item_diff, ItemPatch};
pub use model::{Feed, FeedItem};

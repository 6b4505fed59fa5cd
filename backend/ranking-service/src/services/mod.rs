pub mod feed_composer;
pub mod ranking_config;
pub mod scoring;
pub mod sources;
pub mod view_refresher;

pub use feed_composer::{FeedComposer, FeedRequest, MixRatios};
pub use ranking_config::{KindWeights, RankingConfig};
pub use sources::{ConfigStore, ItemStore, SignalSource};
pub use view_refresher::{start_view_refresher, ViewRefresher};

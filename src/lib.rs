/// Playlist Timer
///
/// Computes the total runtime of a YouTube playlist: paginated retrieval of
/// playlist membership, ISO-8601 duration parsing, batched metadata lookup,
/// and overflow-safe accumulation with resilient handling of partial API
/// responses.

pub mod aggregator;
pub mod client;
pub mod config;
pub mod duration;
pub mod error;
pub mod resolver;
pub mod retry;
pub mod walker;

// Re-export main types for easy access
pub use crate::aggregator::{AggregateOptions, AggregateResult, PlaylistTimer};
pub use crate::client::{extract_playlist_id, DataApiClient, PlaylistApi, PlaylistPage, VideoDetails};
pub use crate::config::Config;
pub use crate::duration::{at_speed, format_duration, parse_duration};
pub use crate::error::{Error, Result};
pub use crate::resolver::{DurationResolver, ResolutionStatus, VideoDuration};
pub use crate::retry::RetryPolicy;
pub use crate::walker::{PlaylistWalker, VideoRef};

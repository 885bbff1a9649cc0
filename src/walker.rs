use futures::stream::{self, Stream};
use tracing::debug;

use crate::client::PlaylistApi;
use crate::error::Result;
use crate::retry::RetryPolicy;

/// A single playlist entry with its absolute 0-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub video_id: String,
    pub position: u64,
}

/// Drives sequential pagination over a playlist.
///
/// Pages are fetched strictly one after another because continuation tokens
/// are stateful cursors; there is no concurrency inside a walk.
pub struct PlaylistWalker<'a, A: PlaylistApi> {
    api: &'a A,
    retry: RetryPolicy,
}

struct WalkState<'a, A: PlaylistApi> {
    api: &'a A,
    retry: RetryPolicy,
    playlist_id: String,
    page_token: Option<String>,
    buffered: std::vec::IntoIter<String>,
    position: u64,
    finished: bool,
}

impl<'a, A: PlaylistApi> PlaylistWalker<'a, A> {
    pub fn new(api: &'a A, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// Walks every page of the playlist, yielding entries in playlist order
    /// with a monotonically increasing position counter running across page
    /// boundaries. The stream is lazy and one-shot: each call starts its own
    /// pagination from the beginning, and a failed page fetch (after the
    /// retry budget) terminates the stream with that error.
    pub fn walk(&self, playlist_id: &str) -> impl Stream<Item = Result<VideoRef>> + 'a {
        let state = WalkState {
            api: self.api,
            retry: self.retry.clone(),
            playlist_id: playlist_id.to_string(),
            page_token: None,
            buffered: Vec::new().into_iter(),
            position: 0,
            finished: false,
        };

        stream::try_unfold(state, |mut state| async move {
            loop {
                if let Some(video_id) = state.buffered.next() {
                    let item = VideoRef {
                        video_id,
                        position: state.position,
                    };
                    state.position += 1;
                    return Ok(Some((item, state)));
                }
                if state.finished {
                    return Ok(None);
                }

                let token = state.page_token.clone();
                let page = state
                    .retry
                    .run("playlist page fetch", || {
                        state.api.list_page(&state.playlist_id, token.as_deref())
                    })
                    .await?;

                debug!(
                    playlist_id = state.playlist_id.as_str(),
                    page_items = page.video_ids.len(),
                    has_next = page.next_page_token.is_some(),
                    "fetched playlist page"
                );

                state.finished = page.next_page_token.is_none();
                state.page_token = page.next_page_token;
                state.buffered = page.video_ids.into_iter();
            }
        })
    }
}

use crate::api::{CommentId, ProgressMarker};
use crate::{gate, CommentStore};

/// One row of the rendered discussion, in display order. The row only carries
/// what the layout needs on top of the comment itself; the comment is looked
/// up in the store by id.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadItem {
    pub id: CommentId,
    /// 0 for top-level comments
    pub depth: usize,
    /// Spoiler-gated for this viewer, recomputed on every call
    pub obscured: bool,
    /// Direct replies known to exist server-side but not loaded yet; drives
    /// the "show more replies" affordance
    pub unloaded_replies: u32,
    /// Still awaiting server confirmation
    pub pending: bool,
}

/// Flattens the loaded tree into display order, bounded to `max_depth` levels
/// of nesting. Replies below the bound are not rendered (they surface through
/// their parent's `unloaded_replies` count staying visible).
pub fn thread(
    store: &CommentStore,
    viewer_progress: ProgressMarker,
    max_depth: usize,
) -> Vec<ThreadItem> {
    let mut items = Vec::new();
    push_level(store, viewer_progress, max_depth, None, 0, &mut items);
    items
}

fn push_level(
    store: &CommentStore,
    viewer_progress: ProgressMarker,
    max_depth: usize,
    parent: Option<CommentId>,
    depth: usize,
    items: &mut Vec<ThreadItem>,
) {
    if depth >= max_depth {
        return;
    }
    for c in store.snapshot(parent) {
        items.push(ThreadItem {
            id: c.id,
            depth,
            obscured: gate::should_obscure(viewer_progress, c.progress_marker),
            unloaded_replies: c.reply_count.saturating_sub(c.children.len() as u32),
            pending: c.pending,
        });
        push_level(store, viewer_progress, max_depth, Some(c.id), depth + 1, items);
    }
}

use std::collections::{HashMap, HashSet};

use crate::api::{self, CommentId, SortOrder, Time, UserId};
use crate::{Comment, CommentPatch, CommentStore};

/// Exact like state captured before an optimistic toggle, restored verbatim
/// on rollback. Restoring the captured pair (rather than re-negating) is what
/// keeps a rollback correct even if the comment was patched in between.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct LikeSnapshot {
    like_count: u32,
    liked: bool,
}

/// Handle for an optimistic post between apply and confirmation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PostTicket {
    pub temp_id: CommentId,
    pub parent_id: Option<CommentId>,
}

/// Handle for an optimistic delete between apply and confirmation
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeleteTicket {
    pub id: CommentId,
    pub parent_id: Option<CommentId>,
    /// Everything the optimistic removal dropped from the store, the comment
    /// and its loaded descendants; fetch state keyed on these ids is garbage
    pub removed: Vec<CommentId>,
}

/// What the caller must do after a post resolves
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PostResolution {
    /// Server accepted; when `refresh_scope` is set the optimistic position
    /// cannot be trusted (chronological-ascending order under concurrent
    /// writers) and the owning scope should be refetched from page 1.
    Confirmed { refresh_scope: bool },
    /// Server refused or the transport failed; the temporary comment is gone.
    RolledBack,
}

/// Every optimistic mutation follows the same three-step shape: apply to the
/// store synchronously, suspend for the network round trip, then confirm or
/// roll back. The `begin_*`/`finish_*` pairs here are the synchronous ends of
/// that shape; the single suspension point sits between them, so the store
/// never observes a dangling optimistic state for longer than one round trip.
///
/// Per comment id, at most one like-toggle and one delete may be in flight;
/// a `begin_*` that would violate that returns None and the caller drops the
/// interaction (coalescing, not queueing).
#[derive(Debug, Default)]
pub struct MutationCoordinator {
    likes_in_flight: HashMap<CommentId, LikeSnapshot>,
    deletes_in_flight: HashSet<CommentId>,
}

impl MutationCoordinator {
    pub fn new() -> MutationCoordinator {
        MutationCoordinator::default()
    }

    /// Flips the like state of `id` optimistically.
    ///
    /// Returns None (and applies nothing) when a toggle for this id is
    /// already in flight (a second tap before the first resolves is
    /// swallowed, never stacked) or when the comment is no longer in the
    /// store.
    pub fn begin_like(&mut self, store: &mut CommentStore, id: CommentId) -> Option<CommentId> {
        if self.likes_in_flight.contains_key(&id) {
            tracing::debug!(comment=?id, "like toggle already in flight, coalescing");
            return None;
        }
        let c = store.get(id)?;
        let snapshot = LikeSnapshot {
            like_count: c.like_count,
            liked: c.liked_by_current_user,
        };
        let now_liked = !snapshot.liked;
        let count = if now_liked {
            snapshot.like_count.saturating_add(1)
        } else {
            snapshot.like_count.saturating_sub(1)
        };
        store.patch(
            id,
            CommentPatch {
                like_count: Some(count),
                liked_by_current_user: Some(now_liked),
                ..Default::default()
            },
        );
        self.likes_in_flight.insert(id, snapshot);
        Some(id)
    }

    /// Resolves an in-flight like toggle. On success the optimistic value
    /// stands; on failure the captured pre-toggle pair is restored as one
    /// atomic patch (a no-op if the comment was deleted in the meantime).
    pub fn finish_like(&mut self, store: &mut CommentStore, id: CommentId, confirmed: bool) {
        let Some(snapshot) = self.likes_in_flight.remove(&id) else {
            tracing::debug!(comment=?id, "like resolution without a matching toggle");
            return;
        };
        if !confirmed {
            store.patch(
                id,
                CommentPatch {
                    like_count: Some(snapshot.like_count),
                    liked_by_current_user: Some(snapshot.liked),
                    ..Default::default()
                },
            );
        }
    }

    /// Inserts a locally-authored comment under a temporary id, positioned
    /// for the parent scope's current sort order.
    pub fn begin_post(
        &mut self,
        store: &mut CommentStore,
        new: &api::NewComment,
        author_id: UserId,
        author_display_name: String,
        created_at: Time,
        sort: SortOrder,
    ) -> PostTicket {
        let temp_id = CommentId::temporary();
        store.insert_optimistic(
            Comment {
                id: temp_id,
                text: new.text.clone(),
                author_id,
                author_display_name,
                progress_marker: new.progress_marker,
                created_at,
                like_count: 0,
                liked_by_current_user: false,
                parent_id: new.parent_id,
                reply_count: 0,
                children: Vec::new(),
                pending: true,
            },
            sort,
        );
        PostTicket {
            temp_id,
            parent_id: new.parent_id,
        }
    }

    /// Resolves an optimistic post: swap in the confirmed comment (position
    /// preserved) or remove the temporary one.
    pub fn finish_post(
        &mut self,
        store: &mut CommentStore,
        ticket: PostTicket,
        sort: SortOrder,
        confirmed: Option<api::Comment>,
    ) -> PostResolution {
        match confirmed {
            Some(c) => {
                store.replace_id(ticket.temp_id, c);
                // Under chronological-ascending order the true position
                // relative to concurrent writers is only known server-side
                PostResolution::Confirmed {
                    refresh_scope: sort == SortOrder::Oldest,
                }
            }
            None => {
                store.remove(ticket.temp_id);
                PostResolution::RolledBack
            }
        }
    }

    /// Removes `id` immediately (content disappears before the server
    /// confirms). Returns None when a delete for this id is already in
    /// flight or the comment is already gone.
    pub fn begin_delete(&mut self, store: &mut CommentStore, id: CommentId) -> Option<DeleteTicket> {
        if self.deletes_in_flight.contains(&id) {
            tracing::debug!(comment=?id, "delete already in flight, ignoring");
            return None;
        }
        let parent_id = store.get(id)?.parent_id;
        let removed = store.remove(id);
        self.deletes_in_flight.insert(id);
        Some(DeleteTicket {
            id,
            parent_id,
            removed,
        })
    }

    /// Resolves an optimistic delete. A failed delete cannot be cheaply
    /// reconstructed from memory (other mutations may have happened since),
    /// so the caller is told to refetch the owning scope instead: returns
    /// the parent scope to refresh, or None when nothing is left to do.
    pub fn finish_delete(
        &mut self,
        ticket: DeleteTicket,
        confirmed: bool,
    ) -> Option<Option<CommentId>> {
        self.deletes_in_flight.remove(&ticket.id);
        if confirmed {
            None
        } else {
            Some(ticket.parent_id)
        }
    }
}

use std::collections::HashMap;

use crate::api::{self, CommentId, ProgressMarker, SortOrder, Time, UserId};

/// A comment as the client holds it: the wire fields plus the ids of the
/// replies loaded so far and whether the comment is still awaiting server
/// confirmation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    pub author_id: UserId,
    pub author_display_name: String,
    pub progress_marker: ProgressMarker,
    pub created_at: Time,
    pub like_count: u32,
    pub liked_by_current_user: bool,
    pub parent_id: Option<CommentId>,

    /// Server-side total of direct replies
    pub reply_count: u32,
    /// Replies actually loaded, in scope order; always a subset of reply_count
    pub children: Vec<CommentId>,
    /// True between optimistic insert and server confirmation
    pub pending: bool,
}

impl From<api::Comment> for Comment {
    fn from(c: api::Comment) -> Comment {
        Comment {
            id: c.id,
            text: c.text,
            author_id: c.author_id,
            author_display_name: c.author_display_name,
            progress_marker: c.progress_marker,
            created_at: c.created_at,
            like_count: c.like_count,
            liked_by_current_user: c.liked_by_current_user,
            parent_id: c.parent_id,
            reply_count: c.reply_count,
            children: Vec::new(),
            pending: false,
        }
    }
}

/// Shallow field merge for [`CommentStore::patch`]. Like state always travels
/// as the `{like_count, liked_by_current_user}` pair so a rollback restores
/// both or neither.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommentPatch {
    pub like_count: Option<u32>,
    pub liked_by_current_user: Option<bool>,
    pub reply_count: Option<u32>,
}

/// Normalized comment tree: records keyed by id, ordered child-id lists per
/// parent. One instance per discussion screen, discarded on navigation.
///
/// Every operation is synchronous, in-memory and infallible; deciding what
/// counts as a failure (and undoing via `patch`/`remove`/`replace_id`) is the
/// caller's job.
#[derive(Debug, Default)]
pub struct CommentStore {
    comments: HashMap<CommentId, Comment>,
    /// Loaded top-level comment ids, in scope order
    roots: Vec<CommentId>,
}

impl CommentStore {
    pub fn new() -> CommentStore {
        CommentStore::default()
    }

    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.comments.get(&id)
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.comments.contains_key(&id)
    }

    /// Ordered ids of the loaded children of `parent` (None = top level)
    pub fn children_ids(&self, parent: Option<CommentId>) -> &[CommentId] {
        match parent {
            None => &self.roots,
            Some(p) => self
                .comments
                .get(&p)
                .map(|c| c.children.as_slice())
                .unwrap_or(&[]),
        }
    }

    /// Materialized, ordered children of `parent`, for rendering
    pub fn snapshot(&self, parent: Option<CommentId>) -> Vec<&Comment> {
        self.children_ids(parent)
            .iter()
            .filter_map(|id| self.comments.get(id))
            .collect()
    }

    /// Merges one fetched page into the children of `parent`.
    ///
    /// `appending == false` discards the scope's history first (sort-order
    /// change or scope restart), subtrees of dropped comments included.
    /// `appending == true` extends the list, de-duplicating by id so a
    /// retried fetch cannot re-add items.
    ///
    /// Returns the ids of every comment dropped from the store, so the caller
    /// can discard fetch state keyed on them.
    pub fn upsert_page(
        &mut self,
        parent: Option<CommentId>,
        page: Vec<api::Comment>,
        appending: bool,
    ) -> Vec<CommentId> {
        let mut removed = Vec::new();
        if let Some(p) = parent {
            if !self.comments.contains_key(&p) {
                tracing::warn!(parent=?p, "got page for a parent comment not in the store");
                return removed;
            }
        }

        if !appending {
            let old = match parent {
                None => std::mem::take(&mut self.roots),
                Some(p) => match self.comments.get_mut(&p) {
                    Some(c) => std::mem::take(&mut c.children),
                    None => Vec::new(),
                },
            };
            for id in old {
                if !page.iter().any(|c| c.id == id) {
                    self.remove_subtree(id, &mut removed);
                }
            }
        }

        for c in page {
            if c.parent_id != parent {
                tracing::warn!(
                    comment = ?c.id,
                    expected = ?parent,
                    actual = ?c.parent_id,
                    "dropping comment delivered in the page of another parent"
                );
                continue;
            }
            let id = c.id;
            match self.comments.get_mut(&id) {
                Some(existing) => {
                    // A refetch must not clobber replies already loaded under
                    // this comment, so only the scalar fields are refreshed.
                    existing.text = c.text;
                    existing.author_display_name = c.author_display_name;
                    existing.like_count = c.like_count;
                    existing.liked_by_current_user = c.liked_by_current_user;
                    existing.reply_count = c.reply_count.max(existing.children.len() as u32);
                    existing.pending = false;
                }
                None => {
                    self.comments.insert(id, Comment::from(c));
                }
            }
            let list = match parent {
                None => &mut self.roots,
                Some(p) => match self.comments.get_mut(&p) {
                    Some(c) => &mut c.children,
                    None => continue,
                },
            };
            if list.contains(&id) {
                tracing::debug!(comment=?id, "page re-delivered an already-held comment");
            } else {
                list.push(id);
            }
        }

        self.clamp_reply_count(parent);
        removed
    }

    /// Adds a comment authored locally, under a temporary id, at the position
    /// appropriate for the scope's current sort order.
    pub fn insert_optimistic(&mut self, comment: Comment, sort: SortOrder) {
        let id = comment.id;
        match comment.parent_id {
            None => {
                self.comments.insert(id, comment);
                place(&mut self.roots, id, sort);
            }
            Some(p) => {
                if !self.comments.contains_key(&p) {
                    tracing::warn!(parent=?p, "optimistic insert under a parent not in the store");
                    return;
                }
                self.comments.insert(id, comment);
                if let Some(pc) = self.comments.get_mut(&p) {
                    pc.reply_count += 1;
                    place(&mut pc.children, id, sort);
                }
            }
        }
    }

    /// Atomically swaps a temporary entry for the server-confirmed comment,
    /// keeping its position in the parent's list.
    pub fn replace_id(&mut self, temp: CommentId, confirmed: api::Comment) {
        let Some(old) = self.comments.remove(&temp) else {
            tracing::debug!(?temp, "confirmation for a comment no longer in the store");
            return;
        };
        let new_id = confirmed.id;
        let mut record = Comment::from(confirmed);
        // Replies posted against the temporary id carry over
        record.children = old.children;
        record.reply_count = record.reply_count.max(record.children.len() as u32);
        let children = record.children.clone();
        self.comments.insert(new_id, record);
        for child in children {
            if let Some(c) = self.comments.get_mut(&child) {
                c.parent_id = Some(new_id);
            }
        }
        let list = match old.parent_id {
            None => &mut self.roots,
            Some(p) => match self.comments.get_mut(&p) {
                Some(c) => &mut c.children,
                None => return,
            },
        };
        if let Some(slot) = list.iter_mut().find(|c| **c == temp) {
            *slot = new_id;
        }
    }

    /// Deletes a comment and every loaded descendant, mirroring the server's
    /// cascade; returns the removed ids. A no-op when the id is already gone.
    pub fn remove(&mut self, id: CommentId) -> Vec<CommentId> {
        let mut removed = Vec::new();
        let Some(parent) = self.comments.get(&id).map(|c| c.parent_id) else {
            return removed;
        };
        match parent {
            None => self.roots.retain(|c| *c != id),
            Some(p) => {
                if let Some(pc) = self.comments.get_mut(&p) {
                    pc.children.retain(|c| *c != id);
                    pc.reply_count = pc
                        .reply_count
                        .saturating_sub(1)
                        .max(pc.children.len() as u32);
                }
            }
        }
        self.remove_subtree(id, &mut removed);
        removed
    }

    /// Shallow-merges the given fields. Deliberately a no-op when the id is
    /// gone: late-arriving confirmations for comments deleted in the meantime
    /// land here.
    pub fn patch(&mut self, id: CommentId, patch: CommentPatch) {
        let Some(c) = self.comments.get_mut(&id) else {
            return;
        };
        if let Some(n) = patch.like_count {
            c.like_count = n;
        }
        if let Some(b) = patch.liked_by_current_user {
            c.liked_by_current_user = b;
        }
        if let Some(n) = patch.reply_count {
            c.reply_count = n.max(c.children.len() as u32);
        }
    }

    fn remove_subtree(&mut self, id: CommentId, removed: &mut Vec<CommentId>) {
        if let Some(c) = self.comments.remove(&id) {
            removed.push(id);
            for child in c.children {
                self.remove_subtree(child, removed);
            }
        }
    }

    fn clamp_reply_count(&mut self, parent: Option<CommentId>) {
        if let Some(p) = parent {
            if let Some(c) = self.comments.get_mut(&p) {
                c.reply_count = c.reply_count.max(c.children.len() as u32);
            }
        }
    }
}

fn place(list: &mut Vec<CommentId>, id: CommentId, sort: SortOrder) {
    match sort {
        SortOrder::Newest => list.insert(0, id),
        // A brand-new comment has zero likes, so under MostLiked it sorts
        // last, same as under chronological order
        SortOrder::Oldest | SortOrder::MostLiked => list.push(id),
    }
}

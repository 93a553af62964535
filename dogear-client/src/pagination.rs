use std::collections::HashMap;

use crate::api::{self, CommentId, PageRequest, SortOrder};
use crate::CommentStore;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Fetch state for one parent's children (None = the top-level thread)
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct ScopeState {
    /// Next page to fetch, 1-based
    page: u32,
    sort: SortOrder,
    has_more: bool,
    loading: bool,
    /// Bumped on every restart so completions of discarded fetches are
    /// recognizable and dropped instead of merged into the new list
    generation: u64,
}

/// A fetch handed out by [`Pagination::begin_fetch`]; the caller performs the
/// request and reports back with the matching generation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageFetch {
    pub request: PageRequest,
    pub generation: u64,
}

/// Per-scope page cursors and the single concurrency guard of the engine:
/// one scope never has two fetches in flight, while distinct scopes are free
/// to interleave.
#[derive(Debug)]
pub struct Pagination {
    scopes: HashMap<Option<CommentId>, ScopeState>,
    page_size: u32,
    root_sort: SortOrder,
    /// Reply scopes are ordered independently of the root thread; every one
    /// of them starts out in this order and the UI only re-sorts the root.
    reply_sort: SortOrder,
}

impl Pagination {
    pub fn new(page_size: u32, root_sort: SortOrder, reply_sort: SortOrder) -> Pagination {
        Pagination {
            scopes: HashMap::new(),
            page_size,
            root_sort,
            reply_sort,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Sort order a scope is (or would be) in, without materializing it
    pub fn sort_of(&self, parent: Option<CommentId>) -> SortOrder {
        match self.scopes.get(&parent) {
            Some(s) => s.sort,
            None => self.default_sort(parent),
        }
    }

    pub fn has_more(&self, parent: Option<CommentId>) -> bool {
        self.scopes.get(&parent).map(|s| s.has_more).unwrap_or(true)
    }

    pub fn is_loading(&self, parent: Option<CommentId>) -> bool {
        self.scopes.get(&parent).map(|s| s.loading).unwrap_or(false)
    }

    /// Starts a fetch for the next page of `parent`'s children.
    ///
    /// Returns None while a fetch for this scope is already in flight (the UI
    /// fires duplicate load-more events freely) or once the scope is
    /// exhausted.
    pub fn begin_fetch(&mut self, parent: Option<CommentId>) -> Option<PageFetch> {
        let default_sort = self.default_sort(parent);
        let scope = self
            .scopes
            .entry(parent)
            .or_insert_with(|| ScopeState::fresh(default_sort));
        if scope.loading || !scope.has_more {
            return None;
        }
        scope.loading = true;
        Some(PageFetch {
            request: PageRequest {
                parent_id: parent,
                page: scope.page,
                page_size: self.page_size,
                sort: scope.sort,
            },
            generation: scope.generation,
        })
    }

    /// Merges a successful page into the store and advances the cursor.
    ///
    /// A page is considered full (so another may exist) only when it returned
    /// exactly the requested size; a short page always ends the scope, server
    /// metadata notwithstanding, so an off-by-one on the server side can
    /// never produce an infinite load loop.
    pub fn complete_fetch(
        &mut self,
        store: &mut CommentStore,
        parent: Option<CommentId>,
        generation: u64,
        comments: Vec<api::Comment>,
    ) {
        let Some(scope) = self.scopes.get_mut(&parent) else {
            return;
        };
        if scope.generation != generation {
            tracing::debug!(?parent, "dropping page from a restarted scope");
            return;
        }
        scope.loading = false;
        scope.has_more = comments.len() as u32 == self.page_size;
        let appending = scope.page > 1;
        scope.page += 1;
        // A replacing page can drop comments (and their subtrees) from the
        // store; their reply scopes must not survive them, or a comment the
        // server later re-delivers would come back with an exhausted cursor
        // and its remaining replies could never be loaded.
        for id in store.upsert_page(parent, comments, appending) {
            self.forget(Some(id));
        }
    }

    /// Failure path: allow a retry of the same page, touch nothing else.
    pub fn fetch_failed(&mut self, parent: Option<CommentId>, generation: u64) {
        if let Some(scope) = self.scopes.get_mut(&parent) {
            if scope.generation == generation {
                scope.loading = false;
            }
        }
    }

    /// Changes a scope's sort order. This is a full restart of the scope, not
    /// an incremental change: cursor back to page 1, `has_more` reset, and
    /// the next completed page replaces the children list outright.
    ///
    /// Returns false (and does nothing) when the order is already in effect.
    pub fn set_sort(&mut self, parent: Option<CommentId>, sort: SortOrder) -> bool {
        let default_sort = self.default_sort(parent);
        let scope = self
            .scopes
            .entry(parent)
            .or_insert_with(|| ScopeState::fresh(default_sort));
        if scope.sort == sort {
            return false;
        }
        scope.sort = sort;
        scope.restart();
        true
    }

    /// Restarts a scope in its current order; the next completed page
    /// replaces the children list. Used when optimistic state for the scope
    /// can no longer be trusted (failed delete, post under `Oldest`).
    pub fn restart(&mut self, parent: Option<CommentId>) {
        let default_sort = self.default_sort(parent);
        let scope = self
            .scopes
            .entry(parent)
            .or_insert_with(|| ScopeState::fresh(default_sort));
        scope.restart();
    }

    /// Drops all fetch state for a scope, for when its parent comment left
    /// the store. A later fetch of the scope starts over from page 1.
    pub fn forget(&mut self, parent: Option<CommentId>) {
        self.scopes.remove(&parent);
    }

    fn default_sort(&self, parent: Option<CommentId>) -> SortOrder {
        match parent {
            None => self.root_sort,
            Some(_) => self.reply_sort,
        }
    }
}

impl ScopeState {
    fn fresh(sort: SortOrder) -> ScopeState {
        ScopeState {
            page: 1,
            sort,
            has_more: true,
            loading: false,
            generation: 0,
        }
    }

    fn restart(&mut self) {
        self.page = 1;
        self.has_more = true;
        self.loading = false;
        self.generation += 1;
    }
}

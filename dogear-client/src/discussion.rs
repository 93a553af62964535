use chrono::Utc;

use crate::api::{
    AuthToken, CommentId, NewComment, ProgressMarker, RequestError, Server, SortOrder, UserId,
};
use crate::{
    view, CommentStore, MutationCoordinator, Pagination, PostResolution, ThreadItem,
    DEFAULT_PAGE_SIZE,
};

/// The reader this screen renders for, as handed over by the session layer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Viewer {
    pub user_id: UserId,
    pub display_name: String,
    /// Where this reader currently is in the book; updated from outside as
    /// they log progress elsewhere in the app
    pub progress: ProgressMarker,
}

/// Terminal state of one user-triggered mutation, for the view to report on.
#[derive(Debug)]
pub enum MutationOutcome {
    Confirmed,
    /// Dropped locally before any request went out: a duplicate tap while the
    /// same mutation was in flight, or a target already gone from the store
    Ignored,
    /// Applied, refused, and undone; like failures stay silent, failed posts
    /// and deletes deserve a dismissible notice
    RolledBack(RequestError),
}

/// One checkpoint discussion: the store, its pagination cursors and the
/// optimistic-mutation state, glued to a [`Server`] implementation.
///
/// Created per discussion screen and dropped on navigation; nothing here is
/// shared across screens or persisted. All async methods catch transport and
/// server errors and fold them into their return value.
pub struct Discussion<S> {
    server: S,
    auth: AuthToken,
    viewer: Viewer,
    store: CommentStore,
    pages: Pagination,
    mutations: MutationCoordinator,
}

impl<S: Server> Discussion<S> {
    pub fn new(server: S, auth: AuthToken, viewer: Viewer) -> Discussion<S> {
        Discussion {
            server,
            auth,
            viewer,
            store: CommentStore::new(),
            pages: Pagination::new(DEFAULT_PAGE_SIZE, SortOrder::Newest, SortOrder::Oldest),
            mutations: MutationCoordinator::new(),
        }
    }

    pub fn with_pagination(
        mut self,
        page_size: u32,
        root_sort: SortOrder,
        reply_sort: SortOrder,
    ) -> Discussion<S> {
        self.pages = Pagination::new(page_size, root_sort, reply_sort);
        self
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    pub fn pages(&self) -> &Pagination {
        &self.pages
    }

    pub fn set_viewer_progress(&mut self, progress: ProgressMarker) {
        self.viewer.progress = progress;
    }

    /// The flattened, spoiler-gated thread for rendering
    pub fn thread(&self, max_depth: usize) -> Vec<ThreadItem> {
        view::thread(&self.store, self.viewer.progress, max_depth)
    }

    /// Fetches the next page of `parent`'s children into the store.
    ///
    /// A no-op while a fetch for the scope is in flight or the scope is
    /// exhausted. On failure nothing in the store changes and the same page
    /// stays fetchable, so retrying is just calling this again.
    pub async fn fetch_next_page(
        &mut self,
        parent: Option<CommentId>,
    ) -> Result<(), RequestError> {
        let Some(fetch) = self.pages.begin_fetch(parent) else {
            return Ok(());
        };
        match self.server.fetch_comments(self.auth, &fetch.request).await {
            Ok(comments) => {
                self.pages
                    .complete_fetch(&mut self.store, parent, fetch.generation, comments);
                Ok(())
            }
            Err(e) => {
                self.pages.fetch_failed(parent, fetch.generation);
                Err(e)
            }
        }
    }

    /// Re-sorts the top-level thread. A full restart of the root scope:
    /// history is discarded and page 1 is fetched in the new order. Reply
    /// scopes keep their own order.
    pub async fn set_sort(&mut self, sort: SortOrder) -> Result<(), RequestError> {
        if !self.pages.set_sort(None, sort) {
            return Ok(());
        }
        self.fetch_next_page(None).await
    }

    pub async fn toggle_like(&mut self, id: CommentId) -> MutationOutcome {
        if self.mutations.begin_like(&mut self.store, id).is_none() {
            return MutationOutcome::Ignored;
        }
        match self.server.toggle_like(self.auth, id).await {
            Ok(()) => {
                self.mutations.finish_like(&mut self.store, id, true);
                MutationOutcome::Confirmed
            }
            Err(e) => {
                self.mutations.finish_like(&mut self.store, id, false);
                MutationOutcome::RolledBack(e)
            }
        }
    }

    pub async fn post_comment(
        &mut self,
        parent: Option<CommentId>,
        text: String,
    ) -> MutationOutcome {
        let sort = self.pages.sort_of(parent);
        let new = NewComment {
            parent_id: parent,
            text,
            progress_marker: self.viewer.progress,
        };
        let ticket = self.mutations.begin_post(
            &mut self.store,
            &new,
            self.viewer.user_id,
            self.viewer.display_name.clone(),
            Utc::now(),
            sort,
        );
        match self.server.post_comment(self.auth, &new).await {
            Ok(confirmed) => {
                let resolution =
                    self.mutations
                        .finish_post(&mut self.store, ticket, sort, Some(confirmed));
                self.pages.forget(Some(ticket.temp_id));
                if let PostResolution::Confirmed { refresh_scope: true } = resolution {
                    self.refresh_scope(parent).await;
                }
                MutationOutcome::Confirmed
            }
            Err(e) => {
                self.mutations.finish_post(&mut self.store, ticket, sort, None);
                self.pages.forget(Some(ticket.temp_id));
                MutationOutcome::RolledBack(e)
            }
        }
    }

    pub async fn delete_comment(&mut self, id: CommentId) -> MutationOutcome {
        let Some(ticket) = self.mutations.begin_delete(&mut self.store, id) else {
            return MutationOutcome::Ignored;
        };
        // Should the server re-deliver any of these later (failed delete,
        // sort roundtrip), their replies must be fetchable from page 1 again
        for gone in &ticket.removed {
            self.pages.forget(Some(*gone));
        }
        match self.server.delete_comment(self.auth, id).await {
            Ok(()) => {
                self.mutations.finish_delete(ticket, true);
                MutationOutcome::Confirmed
            }
            Err(e) => {
                if let Some(parent) = self.mutations.finish_delete(ticket, false) {
                    // the removed subtree is gone from memory; only the
                    // server can restore it
                    self.refresh_scope(parent).await;
                }
                MutationOutcome::RolledBack(e)
            }
        }
    }

    /// Refetches page 1 of a scope after optimistic state stopped being
    /// trustworthy. Best effort: a failure leaves the scope retryable.
    async fn refresh_scope(&mut self, parent: Option<CommentId>) {
        self.pages.restart(parent);
        if let Err(e) = self.fetch_next_page(parent).await {
            tracing::warn!(?parent, err=?e, "scope refresh failed, leaving it retryable");
        }
    }
}

use async_trait::async_trait;

use crate::{AuthToken, Comment, CommentId, NewComment, PageRequest, RequestError};

/// The four remote operations the discussion engine needs.
///
/// The bearer token comes from the session layer and is passed through
/// untouched; retries, timeouts and backoff are the implementor's concern,
/// and any non-success outcome (including a timeout) must surface as a
/// `RequestError` rather than hang.
#[async_trait]
pub trait Server {
    async fn fetch_comments(
        &self,
        auth: AuthToken,
        req: &PageRequest,
    ) -> Result<Vec<Comment>, RequestError>;

    async fn post_comment(
        &self,
        auth: AuthToken,
        new: &NewComment,
    ) -> Result<Comment, RequestError>;

    async fn toggle_like(&self, auth: AuthToken, comment: CommentId) -> Result<(), RequestError>;

    async fn delete_comment(&self, auth: AuthToken, comment: CommentId)
        -> Result<(), RequestError>;
}

#[async_trait]
impl<T: Server + Sync> Server for &T {
    async fn fetch_comments(
        &self,
        auth: AuthToken,
        req: &PageRequest,
    ) -> Result<Vec<Comment>, RequestError> {
        (**self).fetch_comments(auth, req).await
    }

    async fn post_comment(
        &self,
        auth: AuthToken,
        new: &NewComment,
    ) -> Result<Comment, RequestError> {
        (**self).post_comment(auth, new).await
    }

    async fn toggle_like(&self, auth: AuthToken, comment: CommentId) -> Result<(), RequestError> {
        (**self).toggle_like(auth, comment).await
    }

    async fn delete_comment(
        &self,
        auth: AuthToken,
        comment: CommentId,
    ) -> Result<(), RequestError> {
        (**self).delete_comment(auth, comment).await
    }
}

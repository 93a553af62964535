use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use dogear_api::{
    AuthToken, Comment, CommentId, Error, NewComment, PageRequest, ProgressMarker, RequestError,
    Server, SortOrder, Time, UserId, Uuid,
};

/// The remote operations, for scripting failures and counting calls
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Op {
    FetchComments,
    PostComment,
    ToggleLike,
    DeleteComment,
}

/// A scripted failure, consumed by the next call to its operation
#[derive(Clone, Debug)]
pub enum Failure {
    Transport,
    Rejected(Error),
}

#[derive(Debug)]
struct StoredComment {
    id: CommentId,
    text: String,
    author_id: UserId,
    progress_marker: ProgressMarker,
    created_at: Time,
    parent_id: Option<CommentId>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, String>,
    sessions: HashMap<AuthToken, UserId>,
    comments: HashMap<CommentId, StoredComment>,
    /// Direct children per parent, in insertion (chronological) order
    children: HashMap<Option<CommentId>, Vec<CommentId>>,
    likes: HashMap<CommentId, HashSet<UserId>>,
    failures: HashMap<Op, VecDeque<Failure>>,
    calls: HashMap<Op, usize>,
}

/// In-memory [`Server`] for driving the engine in tests: seedable state,
/// per-operation call counters and scripted failures. Never goes near a
/// network.
#[derive(Debug, Default)]
pub struct MockServer {
    inner: Mutex<Inner>,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    pub fn create_user(&self, name: &str) -> UserId {
        let id = UserId(Uuid::new_v4());
        let mut inner = self.inner.lock().expect("mock server lock poisoned");
        inner.users.insert(id, name.to_string());
        id
    }

    pub fn login(&self, user: UserId) -> AuthToken {
        let tok = AuthToken(Uuid::new_v4());
        let mut inner = self.inner.lock().expect("mock server lock poisoned");
        inner.sessions.insert(tok, user);
        tok
    }

    /// Seeds a comment as if posted at `created_at`; ordering under `Oldest`
    /// and `Newest` follows these timestamps.
    pub fn seed_comment(
        &self,
        author: UserId,
        parent: Option<CommentId>,
        text: &str,
        progress_marker: ProgressMarker,
        created_at: Time,
    ) -> CommentId {
        let id = CommentId(Uuid::new_v4());
        let mut inner = self.inner.lock().expect("mock server lock poisoned");
        inner.insert_comment(StoredComment {
            id,
            text: text.to_string(),
            author_id: author,
            progress_marker,
            created_at,
            parent_id: parent,
        });
        id
    }

    pub fn seed_likes(&self, comment: CommentId, likers: impl IntoIterator<Item = UserId>) {
        let mut inner = self.inner.lock().expect("mock server lock poisoned");
        inner.likes.entry(comment).or_default().extend(likers);
    }

    /// Scripts the next call to `op` to fail; queued failures are consumed in
    /// order, after which the operation behaves normally again.
    pub fn fail_next(&self, op: Op, failure: Failure) {
        let mut inner = self.inner.lock().expect("mock server lock poisoned");
        inner.failures.entry(op).or_default().push_back(failure);
    }

    pub fn test_call_count(&self, op: Op) -> usize {
        let inner = self.inner.lock().expect("mock server lock poisoned");
        inner.calls.get(&op).copied().unwrap_or(0)
    }

    pub fn test_comment_exists(&self, id: CommentId) -> bool {
        let inner = self.inner.lock().expect("mock server lock poisoned");
        inner.comments.contains_key(&id)
    }

    pub fn test_num_comments(&self) -> usize {
        let inner = self.inner.lock().expect("mock server lock poisoned");
        inner.comments.len()
    }
}

impl Inner {
    fn insert_comment(&mut self, c: StoredComment) {
        self.children.entry(c.parent_id).or_default().push(c.id);
        self.comments.insert(c.id, c);
    }

    fn begin(&mut self, op: Op, auth: AuthToken) -> Result<UserId, RequestError> {
        *self.calls.entry(op).or_insert(0) += 1;
        if let Some(failure) = self.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            return Err(match failure {
                Failure::Transport => {
                    RequestError::Transport(anyhow!("scripted transport failure"))
                }
                Failure::Rejected(e) => RequestError::Rejected(e),
            });
        }
        self.sessions
            .get(&auth)
            .copied()
            .ok_or(RequestError::Rejected(Error::PermissionDenied))
    }

    fn materialize(&self, id: CommentId, for_user: UserId) -> Option<Comment> {
        let c = self.comments.get(&id)?;
        let likers = self.likes.get(&id);
        Some(Comment {
            id: c.id,
            text: c.text.clone(),
            author_id: c.author_id,
            author_display_name: self
                .users
                .get(&c.author_id)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
            progress_marker: c.progress_marker,
            created_at: c.created_at,
            like_count: likers.map(|l| l.len() as u32).unwrap_or(0),
            liked_by_current_user: likers.map(|l| l.contains(&for_user)).unwrap_or(false),
            parent_id: c.parent_id,
            reply_count: self
                .children
                .get(&Some(c.id))
                .map(|ch| ch.len() as u32)
                .unwrap_or(0),
        })
    }

    fn remove_subtree(&mut self, id: CommentId) {
        self.comments.remove(&id);
        self.likes.remove(&id);
        if let Some(children) = self.children.remove(&Some(id)) {
            for child in children {
                self.remove_subtree(child);
            }
        }
    }
}

#[async_trait]
impl Server for MockServer {
    async fn fetch_comments(
        &self,
        auth: AuthToken,
        req: &PageRequest,
    ) -> Result<Vec<Comment>, RequestError> {
        let mut inner = self.inner.lock().expect("mock server lock poisoned");
        let user = inner.begin(Op::FetchComments, auth)?;
        let mut page: Vec<Comment> = inner
            .children
            .get(&req.parent_id)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| inner.materialize(*id, user))
            .collect();
        match req.sort {
            SortOrder::Newest => page.sort_by_key(|c| (Reverse(c.created_at), c.id)),
            SortOrder::Oldest => page.sort_by_key(|c| (c.created_at, c.id)),
            SortOrder::MostLiked => {
                page.sort_by_key(|c| (Reverse(c.like_count), c.created_at, c.id))
            }
        }
        let start = (req.page.saturating_sub(1) * req.page_size) as usize;
        Ok(page
            .into_iter()
            .skip(start)
            .take(req.page_size as usize)
            .collect())
    }

    async fn post_comment(
        &self,
        auth: AuthToken,
        new: &NewComment,
    ) -> Result<Comment, RequestError> {
        let mut inner = self.inner.lock().expect("mock server lock poisoned");
        let user = inner.begin(Op::PostComment, auth)?;
        new.validate().map_err(RequestError::Rejected)?;
        if let Some(parent) = new.parent_id {
            if !inner.comments.contains_key(&parent) {
                return Err(RequestError::Rejected(Error::CommentNotFound(parent.0)));
            }
        }
        let id = CommentId(Uuid::new_v4());
        inner.insert_comment(StoredComment {
            id,
            text: new.text.clone(),
            author_id: user,
            progress_marker: new.progress_marker,
            created_at: chrono::Utc::now(),
            parent_id: new.parent_id,
        });
        Ok(inner
            .materialize(id, user)
            .expect("comment inserted just above"))
    }

    async fn toggle_like(&self, auth: AuthToken, comment: CommentId) -> Result<(), RequestError> {
        let mut inner = self.inner.lock().expect("mock server lock poisoned");
        let user = inner.begin(Op::ToggleLike, auth)?;
        if !inner.comments.contains_key(&comment) {
            return Err(RequestError::Rejected(Error::CommentNotFound(comment.0)));
        }
        let likers = inner.likes.entry(comment).or_default();
        if !likers.insert(user) {
            likers.remove(&user);
        }
        Ok(())
    }

    async fn delete_comment(
        &self,
        auth: AuthToken,
        comment: CommentId,
    ) -> Result<(), RequestError> {
        let mut inner = self.inner.lock().expect("mock server lock poisoned");
        let user = inner.begin(Op::DeleteComment, auth)?;
        let Some(c) = inner.comments.get(&comment) else {
            return Err(RequestError::Rejected(Error::CommentNotFound(comment.0)));
        };
        if c.author_id != user {
            return Err(RequestError::Rejected(Error::PermissionDenied));
        }
        let parent = c.parent_id;
        if let Some(siblings) = inner.children.get_mut(&parent) {
            siblings.retain(|id| *id != comment);
        }
        inner.remove_subtree(comment);
        Ok(())
    }
}

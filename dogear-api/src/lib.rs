use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

/// Reading position, as a page number or a percentage. Which one it is
/// depends on the book's edition; the server and all clients of one
/// checkpoint agree on the unit, so this core only ever compares markers.
pub type ProgressMarker = u32;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

/// Hard cap on comment length, enforced again server-side.
pub const MAX_COMMENT_LEN: usize = 500;

mod error;
pub use error::{Error, RequestError};

mod server;
pub use server::Server;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(STUB_UUID)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID)
    }
}

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }

    /// Id for a comment that only exists client-side so far. It is replaced
    /// wholesale by the server-assigned id upon confirmation and never leaves
    /// the client.
    pub fn temporary() -> CommentId {
        CommentId(Uuid::new_v4())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum SortOrder {
    Newest,
    Oldest,
    MostLiked,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    pub author_id: UserId,
    pub author_display_name: String,

    /// Position in the book the author was at when commenting
    pub progress_marker: ProgressMarker,
    pub created_at: Time,

    pub like_count: u32,
    /// Scoped to the requesting reader, not global state
    pub liked_by_current_user: bool,

    /// None for a top-level comment on the checkpoint
    pub parent_id: Option<CommentId>,
    /// Server-side total of direct replies; clients usually hold fewer
    pub reply_count: u32,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub parent_id: Option<CommentId>,
    pub text: String,
    pub progress_marker: ProgressMarker,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        validate_text(&self.text)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PageRequest {
    pub parent_id: Option<CommentId>,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
    pub sort: SortOrder,
}

pub fn validate_text(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(s.to_string()));
    }
    let len = s.chars().count();
    if len > MAX_COMMENT_LEN {
        return Err(Error::TextTooLong(len));
    }
    Ok(())
}

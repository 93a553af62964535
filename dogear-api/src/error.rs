use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("No comment with id {0}")]
    CommentNotFound(Uuid),

    #[error("Comment text too long ({0} chars)")]
    TextTooLong(usize),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::TextTooLong(_) => StatusCode::BAD_REQUEST,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::CommentNotFound(id) => json!({
                "message": "comment not found",
                "type": "comment-not-found",
                "comment": id,
            }),
            Error::TextTooLong(len) => json!({
                "message": "comment text too long",
                "type": "text-too-long",
                "length": len,
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "comment-not-found" => Error::CommentNotFound(
                    data.get("comment")
                        .and_then(|c| c.as_str())
                        .and_then(|c| Uuid::from_str(c).ok())
                        .ok_or_else(|| {
                            anyhow!("error is a comment-not-found without a proper id")
                        })?,
                ),
                "text-too-long" => Error::TextTooLong(
                    data.get("length")
                        .and_then(|l| l.as_u64())
                        .ok_or_else(|| anyhow!("error is a text-too-long without a length"))?
                        as usize,
                ),
                "null-byte" => Error::NullByteInString(String::from(
                    data.get("string").and_then(|s| s.as_str()).ok_or_else(|| {
                        anyhow!("error is a null-byte-in-string without a string")
                    })?,
                )),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}

/// Outcome of one round trip to the server, as seen by the client core.
///
/// Anything that is not a structured rejection (unreachable network, timeout,
/// a non-2xx response without a parseable body) is a `Transport` failure;
/// both kinds roll back whatever optimistic state the request carried.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("server rejected the request")]
    Rejected(#[source] Error),

    #[error("transport failure")]
    Transport(#[source] anyhow::Error),
}

impl RequestError {
    pub fn is_transport(&self) -> bool {
        matches!(self, RequestError::Transport(_))
    }

    /// Server-provided message, when there is one to show the user
    pub fn rejection(&self) -> Option<&Error> {
        match self {
            RequestError::Rejected(e) => Some(e),
            RequestError::Transport(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(e: Error) {
        assert_eq!(Error::parse(&e.contents()).unwrap(), e);
    }

    #[test]
    fn error_json_roundtrips() {
        roundtrip(Error::Unknown("oops".to_string()));
        roundtrip(Error::PermissionDenied);
        roundtrip(Error::CommentNotFound(Uuid::new_v4()));
        roundtrip(Error::TextTooLong(501));
        roundtrip(Error::NullByteInString("a\0b".to_string()));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Error::parse(b"not json").is_err());
        assert!(Error::parse(br#"{"type": "who-knows"}"#).is_err());
        assert!(Error::parse(br#"{"message": "no type"}"#).is_err());
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            Error::PermissionDenied.status_code(),
            http::StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::CommentNotFound(Uuid::new_v4()).status_code(),
            http::StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::TextTooLong(9000).status_code(),
            http::StatusCode::BAD_REQUEST
        );
    }
}

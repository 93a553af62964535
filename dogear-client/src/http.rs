use anyhow::anyhow;
use async_trait::async_trait;

use crate::api::{
    AuthToken, Comment, CommentId, Error, NewComment, PageRequest, RequestError, Server,
};

/// Mutation acknowledgement body; `ok: false` is a server-reported failure
/// that did not warrant an error status.
#[derive(serde::Deserialize)]
struct Ack {
    ok: bool,
}

/// [`Server`] over HTTP. Credentials are passed through as bearer tokens and
/// never stored beyond the screen's lifetime; retry and timeout policy live
/// in the underlying `reqwest` client configuration.
pub struct HttpServer {
    host: String,
    client: reqwest::Client,
}

impl HttpServer {
    pub fn new(host: String) -> HttpServer {
        HttpServer {
            host,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(host: String, client: reqwest::Client) -> HttpServer {
        HttpServer { host, client }
    }

    async fn post<Req, Resp>(
        &self,
        auth: AuthToken,
        endpoint: &str,
        body: &Req,
    ) -> Result<Resp, RequestError>
    where
        Req: serde::Serialize,
        Resp: for<'de> serde::Deserialize<'de>,
    {
        let resp = self
            .client
            .post(format!("{}/api/{}", self.host, endpoint))
            .bearer_auth(auth.0)
            .json(body)
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.into()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .bytes()
                .await
                .map_err(|e| RequestError::Transport(e.into()))?;
            return match Error::parse(&body) {
                Ok(e) => Err(RequestError::Rejected(e)),
                // Anything without a structured body is a plain transport
                // failure, timeouts and proxies included
                Err(_) => Err(RequestError::Transport(anyhow!(
                    "unexpected response status {status}"
                ))),
            };
        }
        resp.json()
            .await
            .map_err(|e| RequestError::Transport(e.into()))
    }
}

#[async_trait]
impl Server for HttpServer {
    async fn fetch_comments(
        &self,
        auth: AuthToken,
        req: &PageRequest,
    ) -> Result<Vec<Comment>, RequestError> {
        self.post(auth, "fetch-comments", req).await
    }

    async fn post_comment(
        &self,
        auth: AuthToken,
        new: &NewComment,
    ) -> Result<Comment, RequestError> {
        self.post(auth, "post-comment", new).await
    }

    async fn toggle_like(&self, auth: AuthToken, comment: CommentId) -> Result<(), RequestError> {
        let ack: Ack = self.post(auth, "toggle-like", &comment).await?;
        if ack.ok {
            Ok(())
        } else {
            Err(RequestError::Rejected(Error::Unknown(
                "server reported failure".to_string(),
            )))
        }
    }

    async fn delete_comment(
        &self,
        auth: AuthToken,
        comment: CommentId,
    ) -> Result<(), RequestError> {
        let ack: Ack = self.post(auth, "delete-comment", &comment).await?;
        if ack.ok {
            Ok(())
        } else {
            Err(RequestError::Rejected(Error::Unknown(
                "server reported failure".to_string(),
            )))
        }
    }
}

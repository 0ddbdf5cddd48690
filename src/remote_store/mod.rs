use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::time::Duration;

use crate::image_file::{self, ImageUpload};
use crate::review_record::ReviewRecord;

/// Bounded time for the initial liveness probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(3000);
/// Bounded time for every individual store operation.
pub const OPERATION_TIMEOUT: Duration = Duration::from_millis(5000);

const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug)]
pub enum RemoteError {
    /// The service could not be reached at all (connection refused, DNS, TLS).
    Unreachable { message: String },
    /// The bounded request time elapsed. A timed-out call is a definite
    /// failure; retrying belongs to the caller, not this adapter.
    Timeout { operation: &'static str },
    /// The service answered with a non-success status and a structured reason.
    Rejected { status: u16, message: String },
    /// The service answered, but not in the shape this adapter understands.
    Protocol { message: String },
}
pub type Result<T> = std::result::Result<T, RemoteError>;

/// The remote persistence service as the arbiter sees it.
///
/// Abstracted behind a trait so the arbiter can be driven against scripted
/// doubles in tests exactly like against the real HTTP client.
#[async_trait(?Send)]
pub trait RemoteStore {
    /// One-shot liveness probe. A `true` answer marks the remote
    /// authoritative for the whole session.
    async fn probe(&self) -> bool;

    /// Creates (no id) or updates (id present) a record and returns the
    /// service's canonical version of it, including the assigned id.
    async fn save(
        &self,
        record: &ReviewRecord,
        fresh_image: Option<&ImageUpload>,
    ) -> Result<ReviewRecord>;

    /// Lists the caller's own records. Without credentials there is no
    /// identity to scope the query, so this resolves to an empty list.
    async fn list_mine(&self) -> Result<Vec<ReviewRecord>>;

    /// Lists publicly visible records.
    async fn list_public(&self) -> Result<Vec<ReviewRecord>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ReviewRecord>>;

    /// Deletes the record, reporting whether the service knew it.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Flips the public/private flag of a stored record.
    async fn set_visibility(&self, id: i64, is_private: bool) -> Result<bool>;
}

/// `RemoteStore` over the review service's REST API.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemote {
    /// A client for the service rooted at `base_url` (e.g. "https://host/reviews").
    /// An empty base url stands for "no remote configured"; the probe then
    /// reports the service as unreachable without a network round trip.
    pub fn new(base_url: &str, token: Option<String>) -> HttpRemote {
        HttpRemote {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTH_HEADER, token),
            None => request,
        }
    }

    async fn rejection(response: reqwest::Response) -> RemoteError {
        let status = response.status().as_u16();
        let message = match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("")
                .to_string(),
            Err(_) => String::new(),
        };
        RemoteError::Rejected { status, message }
    }
}

fn send_error(operation: &'static str, error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout { operation }
    } else {
        RemoteError::Unreachable {
            message: error.to_string(),
        }
    }
}

fn protocol_error(error: impl fmt::Display) -> RemoteError {
    RemoteError::Protocol {
        message: error.to_string(),
    }
}

/// The version of a record that goes over the wire.
///
/// Without a fresh binary upload, an oversized inline image is dropped to
/// bound the request size. This is lossy on purpose; the stored image on the
/// service side stays whatever the last real upload put there.
fn outgoing_record(record: &ReviewRecord, has_fresh_image: bool) -> ReviewRecord {
    let mut outgoing = record.clone();
    if !has_fresh_image {
        if let Some(embedded) = &outgoing.image {
            if image_file::is_oversized(embedded) {
                outgoing.image = None;
            }
        }
    }
    outgoing
}

#[async_trait(?Send)]
impl RemoteStore for HttpRemote {
    async fn probe(&self) -> bool {
        if self.base_url.is_empty() {
            return false;
        }

        let response = self
            .with_auth(self.client.get(self.url("api/ping")))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => response
                .json::<serde_json::Value>()
                .await
                .map(|body| body.get("ok").and_then(|ok| ok.as_bool()).unwrap_or(false))
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn save(
        &self,
        record: &ReviewRecord,
        fresh_image: Option<&ImageUpload>,
    ) -> Result<ReviewRecord> {
        let outgoing = outgoing_record(record, fresh_image.is_some());

        let request = match record.id {
            Some(id) => self.client.put(self.url(&format!("api/reviews/{}", id))),
            None => self.client.post(self.url("api/reviews")),
        };
        let request = self.with_auth(request).timeout(OPERATION_TIMEOUT);

        let response = match fresh_image {
            Some(upload) => {
                let data = serde_json::to_string(&outgoing).map_err(protocol_error)?;
                let image_part = reqwest::multipart::Part::bytes(upload.bytes.clone())
                    .file_name(upload.file_name.clone())
                    .mime_str(upload.mime_type)
                    .map_err(protocol_error)?;
                let form = reqwest::multipart::Form::new()
                    .text("data", data)
                    .part("image", image_part);
                request.multipart(form).send().await
            }
            None => request.json(&outgoing).send().await,
        }
        .map_err(|error| send_error("save", error))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        // The service answers either the bare record or {review: record}.
        let body: serde_json::Value = response.json().await.map_err(protocol_error)?;
        let saved = body.get("review").cloned().unwrap_or(body);
        serde_json::from_value(saved).map_err(protocol_error)
    }

    async fn list_mine(&self) -> Result<Vec<ReviewRecord>> {
        if self.token.is_none() {
            return Ok(Vec::new());
        }

        let response = self
            .with_auth(self.client.get(self.url("api/my/reviews")))
            .timeout(OPERATION_TIMEOUT)
            .send()
            .await
            .map_err(|error| send_error("list_mine", error))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        response.json().await.map_err(protocol_error)
    }

    async fn list_public(&self) -> Result<Vec<ReviewRecord>> {
        let response = self
            .client
            .get(self.url("api/public/reviews"))
            .timeout(OPERATION_TIMEOUT)
            .send()
            .await
            .map_err(|error| send_error("list_public", error))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        response.json().await.map_err(protocol_error)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ReviewRecord>> {
        let response = self
            .with_auth(self.client.get(self.url(&format!("api/reviews/{}", id))))
            .timeout(OPERATION_TIMEOUT)
            .send()
            .await
            .map_err(|error| send_error("get_by_id", error))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        response.json().await.map(Some).map_err(protocol_error)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let response = self
            .with_auth(self.client.delete(self.url(&format!("api/reviews/{}", id))))
            .timeout(OPERATION_TIMEOUT)
            .send()
            .await
            .map_err(|error| send_error("delete", error))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(true)
    }

    async fn set_visibility(&self, id: i64, is_private: bool) -> Result<bool> {
        let response = self
            .with_auth(
                self.client
                    .put(self.url(&format!("api/reviews/{}/privacy", id))),
            )
            .timeout(OPERATION_TIMEOUT)
            .json(&serde_json::json!({ "isPrivate": is_private }))
            .send()
            .await
            .map_err(|error| send_error("set_visibility", error))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(true)
    }
}

// Error Boilerplate (Error display and source)
impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error During Remote Store Interaction({:?})", self)
    }
}
impl Error for RemoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serves exactly one request with the given canned body, then closes.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).await;
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });

        format!("http://{}", address)
    }

    #[tokio::test]
    async fn probe_accepts_a_healthy_service() {
        let base = one_shot_server("HTTP/1.1 200 OK", r#"{"ok":true}"#).await;
        let remote = HttpRemote::new(&base, None);
        assert!(remote.probe().await);
    }

    #[tokio::test]
    async fn probe_rejects_an_unhealthy_answer() {
        let base = one_shot_server("HTTP/1.1 200 OK", r#"{"ok":false}"#).await;
        let remote = HttpRemote::new(&base, None);
        assert!(!remote.probe().await);
    }

    #[tokio::test]
    async fn probe_fails_closed_when_nothing_listens() {
        // Bind-then-drop guarantees a port nobody answers on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let remote = HttpRemote::new(&base, None);
        assert!(!remote.probe().await);
    }

    #[tokio::test]
    async fn probe_without_configured_remote_is_immediate() {
        let remote = HttpRemote::new("", None);
        assert!(!remote.probe().await);
    }

    #[tokio::test]
    async fn save_adopts_the_service_assigned_id() {
        let base = one_shot_server(
            "HTTP/1.1 200 OK",
            r#"{"review":{"id":42,"productType":"Fleur","productName":"Amnesia"}}"#,
        )
        .await;
        let remote = HttpRemote::new(&base, Some("token-abc".to_string()));

        let mut record = ReviewRecord::default();
        record.product_type = "Fleur".to_string();
        record.product_name = Some("Amnesia".to_string());

        let saved = remote.save(&record, None).await.unwrap();
        assert_eq!(saved.id, Some(42));
    }

    #[tokio::test]
    async fn save_surfaces_structured_rejections() {
        let base = one_shot_server(
            "HTTP/1.1 403 Forbidden",
            r#"{"message":"not your review"}"#,
        )
        .await;
        let remote = HttpRemote::new(&base, None);

        let record = ReviewRecord::default();
        match remote.save(&record, None).await {
            Err(RemoteError::Rejected { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "not your review");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn list_mine_without_credentials_is_empty_without_network() {
        // No server exists; an attempted call would error, an empty answer
        // proves no call was made.
        let remote = HttpRemote::new("http://127.0.0.1:9", None);
        assert!(remote.list_mine().await.unwrap().is_empty());
    }

    #[test]
    fn oversized_inline_images_are_stripped_without_fresh_upload() {
        let mut record = ReviewRecord::default();
        record.image = Some("x".repeat(image_file::INLINE_IMAGE_LIMIT + 1));

        assert_eq!(outgoing_record(&record, false).image, None);
        // A fresh upload or a small inline image rides along unchanged.
        assert!(outgoing_record(&record, true).image.is_some());
        record.image = Some("small".to_string());
        assert_eq!(outgoing_record(&record, false).image.as_deref(), Some("small"));
    }
}

//! Backend transport.
//!
//! [`ChatBackend`] is the seam between the session engine and the remote
//! service. [`HttpBackend`] talks to the `/api` HTTP surface with reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attachment::ImageFile;
use crate::chat::ConversationId;
use crate::config::ClientConfig;
use crate::error::NetworkError;
use crate::history::{ConversationDetail, ConversationSummary};

/// One outbound chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Trimmed user text.
    pub prompt: String,
    /// Model identifier.
    pub model: String,
    /// Conversation id, possibly provisional.
    pub conversation_id: Option<ConversationId>,
    /// Staged image, sent as multipart when present.
    pub image: Option<ImageFile>,
}

/// JSON body used when no image is attached.
#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    prompt: &'a str,
    model: &'a str,
    conversation_id: Option<&'a ConversationId>,
}

impl ChatRequest {
    fn payload(&self) -> ChatPayload<'_> {
        ChatPayload {
            prompt: &self.prompt,
            model: &self.model,
            conversation_id: self.conversation_id.as_ref(),
        }
    }

    fn form(&self) -> Result<Option<Form>, NetworkError> {
        let Some(image) = &self.image else {
            return Ok(None);
        };
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.name.clone())
            .mime_str(&image.mime_type)
            .map_err(|e| NetworkError::InvalidRequest(format!("attachment MIME type: {e}")))?;

        let mut form = Form::new()
            .text("prompt", self.prompt.clone())
            .text("model", self.model.clone());
        if let Some(id) = &self.conversation_id {
            form = form.text("conversation_id", id.to_string());
        }
        Ok(Some(form.part("image", part)))
    }
}

/// Reply to a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    /// Assistant reply text.
    pub response: String,
    /// Server-assigned conversation id.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

/// Remote service consumed by the session engine.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `POST /chat`.
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, NetworkError>;

    /// `GET /conversations`.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, NetworkError>;

    /// `GET /conversations/{id}`.
    async fn fetch_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<ConversationDetail, NetworkError>;

    /// `DELETE /conversations/{id}`.
    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), NetworkError>;
}

/// Conversation list, bare or wrapped in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SummaryList {
    Bare(Vec<ConversationSummary>),
    Wrapped {
        conversations: Vec<ConversationSummary>,
    },
}

impl SummaryList {
    fn into_vec(self) -> Vec<ConversationSummary> {
        match self {
            Self::Bare(list) | Self::Wrapped { conversations: list } => list,
        }
    }
}

/// HTTP implementation of [`ChatBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpBackend {
    /// Build a backend from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    fn conversation_url(&self, id: &ConversationId) -> Result<String, NetworkError> {
        if !id.is_path_safe() {
            return Err(NetworkError::InvalidConversationId(id.to_string()));
        }
        Ok(self.config.endpoint(&format!("conversations/{id}")))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, NetworkError> {
        let url = self.config.endpoint("chat");
        let builder = self.client.post(&url);
        let builder = match request.form()? {
            Some(form) => builder.multipart(form),
            None => builder.json(&request.payload()),
        };
        debug!(
            url = %url,
            model = %request.model,
            has_image = request.image.is_some(),
            "Sending chat request"
        );
        let response = builder.send().await.map_err(transport_error)?;
        read_json(response).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, NetworkError> {
        let response = self
            .client
            .get(self.config.endpoint("conversations"))
            .send()
            .await
            .map_err(transport_error)?;
        read_json::<SummaryList>(response).await.map(SummaryList::into_vec)
    }

    async fn fetch_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<ConversationDetail, NetworkError> {
        let response = self
            .client
            .get(self.conversation_url(id)?)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), NetworkError> {
        let response = self
            .client
            .delete(self.conversation_url(id)?)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NetworkError::from_status(status.as_u16(), &body))
    }
}

fn transport_error(err: reqwest::Error) -> NetworkError {
    if err.is_decode() {
        NetworkError::Decode(err.to_string())
    } else {
        NetworkError::Unreachable(err.to_string())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, NetworkError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(transport_error)?;
    parse_response(status, &body)
}

/// Decode a response body, classifying non-success statuses.
fn parse_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, NetworkError> {
    if !(200..300).contains(&status) {
        return Err(NetworkError::from_status(status, body));
    }
    serde_json::from_str(body).map_err(|e| NetworkError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn request(image: Option<ImageFile>) -> ChatRequest {
        ChatRequest {
            prompt: "What is aspirin?".into(),
            model: "gemini".into(),
            conversation_id: Some(ConversationId::new("1717000000000")),
            image,
        }
    }

    #[test]
    fn test_json_payload_shape() {
        let json = serde_json::to_value(request(None).payload()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "prompt": "What is aspirin?",
                "model": "gemini",
                "conversation_id": "1717000000000",
            })
        );
    }

    #[test]
    fn test_json_payload_null_conversation() {
        let mut req = request(None);
        req.conversation_id = None;
        let json = serde_json::to_value(req.payload()).unwrap();
        assert!(json["conversation_id"].is_null());
    }

    #[test]
    fn test_form_only_with_image() {
        assert!(request(None).form().unwrap().is_none());

        let image = ImageFile::new("rx.png", "image/png", vec![1, 2, 3]);
        let form = request(Some(image)).form().unwrap();
        assert!(form.is_some());
    }

    /// Serve one `/chat` request on a local socket and return it raw.
    async fn capture_chat(request: ChatRequest) -> (String, ChatReply) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut socket).await;
            let body = r#"{"response": "ok", "conversation_id": "srv_1"}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            raw
        });

        let config = ClientConfig::default().with_base_url(format!("http://{addr}/api"));
        let backend = HttpBackend::new(config).unwrap();
        let reply = backend.send_chat(&request).await.unwrap();
        (server.await.unwrap(), reply)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        while !request_complete(&buf) {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn request_complete(buf: &[u8]) -> bool {
        let Some(split) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&buf[..split]).to_ascii_lowercase();
        let body = &buf[split + 4..];
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());
        match length {
            Some(length) => body.len() >= length,
            None if head.contains("transfer-encoding: chunked") => body.ends_with(b"0\r\n\r\n"),
            None => true,
        }
    }

    #[tokio::test]
    async fn test_send_chat_with_image_is_multipart() {
        let image = ImageFile::new("rx.png", "image/png", vec![1, 2, 3]);
        let (raw, reply) = capture_chat(request(Some(image))).await;
        let lower = raw.to_ascii_lowercase();

        assert!(raw.starts_with("POST /api/chat "));
        assert!(lower.contains("content-type: multipart/form-data; boundary="));
        assert!(raw.contains(r#"name="prompt""#));
        assert!(raw.contains("What is aspirin?"));
        assert!(raw.contains(r#"name="model""#));
        assert!(raw.contains(r#"name="conversation_id""#));
        assert!(raw.contains("1717000000000"));
        assert!(raw.contains(r#"name="image"; filename="rx.png""#));
        assert!(lower.contains("content-type: image/png"));
        assert!(!lower.contains("application/json"));
        assert_eq!(reply.conversation_id, Some(ConversationId::new("srv_1")));
    }

    #[tokio::test]
    async fn test_multipart_omits_missing_conversation_id() {
        let mut req = request(Some(ImageFile::new("rx.jpg", "image/jpeg", vec![9])));
        req.conversation_id = None;
        let (raw, _) = capture_chat(req).await;

        assert!(raw.contains(r#"name="prompt""#));
        assert!(raw.contains(r#"name="image"; filename="rx.jpg""#));
        assert!(!raw.contains(r#"name="conversation_id""#));
    }

    #[tokio::test]
    async fn test_send_chat_without_image_is_json() {
        let (raw, reply) = capture_chat(request(None)).await;
        let lower = raw.to_ascii_lowercase();

        assert!(raw.starts_with("POST /api/chat "));
        assert!(lower.contains("content-type: application/json"));
        assert!(!lower.contains("multipart/form-data"));
        assert!(raw.contains(r#""prompt":"What is aspirin?""#));
        assert!(raw.contains(r#""conversation_id":"1717000000000""#));
        assert_eq!(reply.response, "ok");
    }

    #[test]
    fn test_form_rejects_bad_mime() {
        let image = ImageFile::new("rx.png", "not a mime", vec![1]);
        let err = request(Some(image)).form().unwrap_err();
        assert!(matches!(err, NetworkError::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_chat_reply() {
        let reply: ChatReply =
            parse_response(200, r#"{"response": "Hello", "conversation_id": 42}"#).unwrap();
        assert_eq!(reply.response, "Hello");
        assert_eq!(reply.conversation_id, Some(ConversationId::new("42")));

        let reply: ChatReply = parse_response(200, r#"{"response": "Hi"}"#).unwrap();
        assert!(reply.conversation_id.is_none());
    }

    #[test]
    fn test_parse_error_status() {
        let err = parse_response::<ChatReply>(401, "").unwrap_err();
        assert!(err.requires_credential());

        let err = parse_response::<ChatReply>(429, "").unwrap_err();
        assert!(matches!(err, NetworkError::RateLimited(_)));
    }

    #[test]
    fn test_parse_malformed_body() {
        let err = parse_response::<ChatReply>(200, "<html>").unwrap_err();
        assert!(matches!(err, NetworkError::Decode(_)));
    }

    #[test]
    fn test_summary_list_shapes() {
        let bare: SummaryList =
            serde_json::from_str(r#"[{"id": "a", "title": "A", "timestamp": 1}]"#).unwrap();
        assert_eq!(bare.into_vec().len(), 1);

        let wrapped: SummaryList = serde_json::from_str(
            r#"{"conversations": [{"id": "a", "title": "A", "timestamp": 1}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.into_vec().len(), 1);
    }

    #[test]
    fn test_conversation_url_rejects_unsafe_ids() {
        let backend = HttpBackend::new(ClientConfig::default()).unwrap();
        assert_eq!(
            backend.conversation_url(&ConversationId::new("conv_1")).unwrap(),
            "http://localhost:8000/api/conversations/conv_1"
        );
        assert!(matches!(
            backend.conversation_url(&ConversationId::new("../admin")),
            Err(NetworkError::InvalidConversationId(_))
        ));
    }
}

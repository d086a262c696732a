use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::board::models::{
    Board, BoardPatch, Card, CardPatch, Lane, LanePatch, MoveCard, NewBoard, NewCard, NewLane,
    VerifyReport,
};
use crate::errors::ClientError;

/// Everything the client store needs from the board API.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn list_boards(&self) -> Result<Vec<Board>, ClientError>;
    async fn get_board(&self, uuid: &str) -> Result<Board, ClientError>;
    async fn create_board(&self, new: &NewBoard) -> Result<Board, ClientError>;
    async fn update_board(&self, uuid: &str, patch: &BoardPatch) -> Result<Board, ClientError>;
    async fn delete_board(&self, uuid: &str) -> Result<(), ClientError>;

    async fn list_lanes(&self, board_uuid: &str) -> Result<Vec<Lane>, ClientError>;
    async fn create_lane(&self, board_uuid: &str, new: &NewLane) -> Result<Lane, ClientError>;
    async fn update_lane(&self, uuid: &str, patch: &LanePatch) -> Result<Lane, ClientError>;
    async fn delete_lane(&self, uuid: &str) -> Result<(), ClientError>;

    async fn list_cards(&self, lane_uuid: &str) -> Result<Vec<Card>, ClientError>;
    async fn create_card(&self, lane_uuid: &str, new: &NewCard) -> Result<Card, ClientError>;
    async fn update_card(&self, uuid: &str, patch: &CardPatch) -> Result<Card, ClientError>;
    async fn delete_card(&self, uuid: &str) -> Result<(), ClientError>;
    async fn move_card(&self, uuid: &str, mv: &MoveCard) -> Result<Card, ClientError>;

    async fn verify(&self) -> Result<VerifyReport, ClientError>;
}

/// HTTP implementation of [`BoardApi`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ClientError> {
        debug!(%method, path, "api request");
        let mut request = self.http.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status,
            message: error_message(&text, status),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.send::<()>(Method::GET, path, None).await?;
        Ok(resp.json().await?)
    }

    async fn write<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.send(method, path, Some(body)).await?;
        Ok(resp.json().await?)
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }
}

/// Best human message from an error body: `error`, then the joined
/// validation `errors`, then the status line.
fn error_message(body: &str, status: u16) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    if let Some(value) = parsed {
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(errors) = value.get("errors").and_then(Value::as_array) {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return messages.join("; ");
            }
        }
    }
    format!("Request failed with status code {}", status)
}

#[async_trait]
impl BoardApi for ApiClient {
    async fn list_boards(&self) -> Result<Vec<Board>, ClientError> {
        self.get("/api/boards").await
    }

    async fn get_board(&self, uuid: &str) -> Result<Board, ClientError> {
        self.get(&format!("/api/boards/{}", uuid)).await
    }

    async fn create_board(&self, new: &NewBoard) -> Result<Board, ClientError> {
        self.write(Method::POST, "/api/boards", new).await
    }

    async fn update_board(&self, uuid: &str, patch: &BoardPatch) -> Result<Board, ClientError> {
        self.write(Method::PUT, &format!("/api/boards/{}", uuid), patch).await
    }

    async fn delete_board(&self, uuid: &str) -> Result<(), ClientError> {
        self.delete(&format!("/api/boards/{}", uuid)).await
    }

    async fn list_lanes(&self, board_uuid: &str) -> Result<Vec<Lane>, ClientError> {
        self.get(&format!("/api/boards/{}/lanes", board_uuid)).await
    }

    async fn create_lane(&self, board_uuid: &str, new: &NewLane) -> Result<Lane, ClientError> {
        self.write(Method::POST, &format!("/api/boards/{}/lanes", board_uuid), new)
            .await
    }

    async fn update_lane(&self, uuid: &str, patch: &LanePatch) -> Result<Lane, ClientError> {
        self.write(Method::PUT, &format!("/api/lanes/{}", uuid), patch).await
    }

    async fn delete_lane(&self, uuid: &str) -> Result<(), ClientError> {
        self.delete(&format!("/api/lanes/{}", uuid)).await
    }

    async fn list_cards(&self, lane_uuid: &str) -> Result<Vec<Card>, ClientError> {
        self.get(&format!("/api/lanes/{}/cards", lane_uuid)).await
    }

    async fn create_card(&self, lane_uuid: &str, new: &NewCard) -> Result<Card, ClientError> {
        self.write(Method::POST, &format!("/api/lanes/{}/cards", lane_uuid), new)
            .await
    }

    async fn update_card(&self, uuid: &str, patch: &CardPatch) -> Result<Card, ClientError> {
        self.write(Method::PUT, &format!("/api/cards/{}", uuid), patch).await
    }

    async fn delete_card(&self, uuid: &str) -> Result<(), ClientError> {
        self.delete(&format!("/api/cards/{}", uuid)).await
    }

    async fn move_card(&self, uuid: &str, mv: &MoveCard) -> Result<Card, ClientError> {
        self.write(Method::PUT, &format!("/api/cards/{}/move", uuid), mv).await
    }

    /// A failed verification still carries a report, so a 500 with a report
    /// body is returned as `Ok`.
    async fn verify(&self) -> Result<VerifyReport, ClientError> {
        let resp = self.http.get(self.url("/api/verify")).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        match serde_json::from_str::<VerifyReport>(&text) {
            Ok(report) => Ok(report),
            Err(_) => Err(ClientError::Api {
                status,
                message: error_message(&text, status),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_error_field() {
        assert_eq!(
            error_message(r#"{"error":"Card not found"}"#, 404),
            "Card not found"
        );
    }

    #[test]
    fn test_error_message_joins_validation_errors() {
        let body = r#"{"errors":[{"field":"title","message":"Title is required"},
                                 {"field":"position","message":"Position must be a non-negative integer"}]}"#;
        assert_eq!(
            error_message(body, 400),
            "Title is required; Position must be a non-negative integer"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_status() {
        assert_eq!(
            error_message("<html>bad gateway</html>", 502),
            "Request failed with status code 502"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:5001/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5001");
        assert_eq!(client.url("/api/boards"), "http://localhost:5001/api/boards");
    }
}

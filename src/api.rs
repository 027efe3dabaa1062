//! Signage server API client

use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::*;
use crate::upload::{MultipartBody, ProgressCallback, ProgressReader};

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (DNS, connect, timeout, broken pipe)
    #[error("connection failed: {0}")]
    Transport(String),
    /// Well-formed rejection from the server
    #[error("request rejected (HTTP {status}): {}", .reason.as_deref().unwrap_or("no reason given"))]
    Rejected { status: u16, reason: Option<String> },
    /// The server answered with something we could not interpret
    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Message for the operator: the server's reason when it gave one
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Rejected { reason: Some(reason), .. } if !reason.trim().is_empty() => reason.clone(),
            _ => fallback.to_string(),
        }
    }
}

impl From<ureq::Error> for ApiError {
    fn from(e: ureq::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Common `{success, message, error}` envelope of every endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Ack {
    /// Endpoints that omit `success` signal failure through `error` alone
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(self.error.is_none())
    }
}

/// Playlist as returned by the content endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSnapshot {
    pub items: Vec<ContentItem>,
    pub display_running: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ContentListResponse {
    #[serde(default)]
    content: Option<Vec<ContentItem>>,
    #[serde(default)]
    display_running: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DisplayStatusResponse {
    #[serde(default)]
    status: Option<PlaybackStatus>,
    #[serde(default)]
    current_item: Option<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    content: Option<OneOrMany<ContentItem>>,
    #[serde(default)]
    message: Option<String>,
}

/// Items created by an upload request
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub items: Vec<ContentItem>,
    pub message: Option<String>,
}

/// Check the status line and envelope before looking at the payload
pub fn decode_ack(status: u16, body: &str) -> ApiResult<Ack> {
    match serde_json::from_str::<Ack>(body) {
        Ok(ack) => {
            if status >= 400 || !ack.is_success() {
                let reason = ack.error.clone().or_else(|| ack.message.clone());
                Err(ApiError::Rejected { status, reason })
            } else {
                Ok(ack)
            }
        }
        Err(_) if status >= 400 => Err(ApiError::Rejected { status, reason: None }),
        Err(e) => Err(ApiError::Malformed(e.to_string())),
    }
}

fn decode_payload<T: DeserializeOwned>(status: u16, body: &str) -> ApiResult<T> {
    decode_ack(status, body)?;
    serde_json::from_str(body).map_err(|e| ApiError::Malformed(e.to_string()))
}

pub fn decode_content(status: u16, body: &str) -> ApiResult<ContentSnapshot> {
    let response: ContentListResponse = decode_payload(status, body)?;
    let mut items = response
        .content
        .ok_or_else(|| ApiError::Malformed("content list missing".to_string()))?;
    items.sort_by_key(|item| item.order);
    Ok(ContentSnapshot { items, display_running: response.display_running })
}

pub fn decode_display_status(status: u16, body: &str) -> ApiResult<PlaybackState> {
    let response: DisplayStatusResponse = decode_payload(status, body)?;
    let status = response
        .status
        .ok_or_else(|| ApiError::Malformed("playback status missing".to_string()))?;
    Ok(PlaybackState {
        status,
        current_item: if status == PlaybackStatus::Playing { response.current_item } else { None },
    })
}

pub fn decode_upload(status: u16, body: &str) -> ApiResult<UploadOutcome> {
    let response: UploadResponse = decode_payload(status, body)?;
    Ok(UploadOutcome {
        items: response.content.map(OneOrMany::into_vec).unwrap_or_default(),
        message: response.message,
    })
}

pub fn decode_system_info(status: u16, body: &str) -> ApiResult<SystemInfo> {
    decode_payload(status, body)
}

/// Percent-encode one URL path segment
pub fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[derive(Clone)]
pub struct PanelClient {
    server: String,
    user_agent: String,
    agent: ureq::Agent,
}

impl PanelClient {
    pub fn new(server: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            user_agent: format!("SignagePanel/{}", env!("CARGO_PKG_VERSION")),
            agent: Self::create_agent(Duration::from_secs(30)),
        }
    }

    /// Status codes are left to the caller so error bodies can be read
    fn create_agent(timeout: Duration) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .timeout_connect(Some(Duration::from_secs(10)))
            .http_status_as_error(false)
            .build()
            .new_agent()
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn location_url(&self, location: &str, path: &str) -> String {
        format!("{}/api/{}/{}", self.server, encode_segment(location), path)
    }

    /// Public URL of an uploaded media file
    pub fn media_url(&self, location: &str, filename: &str) -> String {
        format!("{}/uploads/{}/{}", self.server, encode_segment(location), encode_segment(filename))
    }

    /// Full-screen player page of a location
    pub fn screen_url(&self, location: &str) -> String {
        format!("{}/screen{}", self.server, encode_segment(location))
    }

    fn read(mut response: ureq::http::Response<ureq::Body>) -> ApiResult<(u16, String)> {
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        Ok((status, body))
    }

    fn get(&self, url: &str) -> ApiResult<(u16, String)> {
        log::debug!("GET {}", url);
        let response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .call()?;
        Self::read(response)
    }

    fn post_empty(&self, url: &str) -> ApiResult<(u16, String)> {
        log::debug!("POST {}", url);
        let response = self
            .agent
            .post(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .send_empty()?;
        Self::read(response)
    }

    fn send_json(&self, method: &str, url: &str, payload: &Value) -> ApiResult<(u16, String)> {
        log::debug!("{} {} {}", method, url, payload);
        let body = payload.to_string();
        let request = match method {
            "PUT" => self.agent.put(url),
            _ => self.agent.post(url),
        };
        let response = request
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .send(body)?;
        Self::read(response)
    }

    fn delete(&self, url: &str) -> ApiResult<(u16, String)> {
        log::debug!("DELETE {}", url);
        let response = self
            .agent
            .delete(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .call()?;
        Self::read(response)
    }

    pub fn get_content(&self, location: &str) -> ApiResult<ContentSnapshot> {
        let (status, body) = self.get(&self.location_url(location, "content"))?;
        decode_content(status, &body)
    }

    pub fn get_display_status(&self, location: &str) -> ApiResult<PlaybackState> {
        let (status, body) = self.get(&self.location_url(location, "display/status"))?;
        decode_display_status(status, &body)
    }

    pub fn start_display(&self, location: &str) -> ApiResult<Ack> {
        let (status, body) = self.post_empty(&self.location_url(location, "display/start"))?;
        decode_ack(status, &body)
    }

    pub fn stop_display(&self, location: &str) -> ApiResult<Ack> {
        let (status, body) = self.post_empty(&self.location_url(location, "display/stop"))?;
        decode_ack(status, &body)
    }

    /// Submit the complete playlist order; index in `ids` is the new rank
    pub fn update_order(&self, location: &str, ids: &[i64]) -> ApiResult<Ack> {
        let (status, body) = self.send_json(
            "POST",
            &self.location_url(location, "content/order"),
            &order_payload(ids),
        )?;
        decode_ack(status, &body)
    }

    pub fn update_duration(&self, location: &str, id: i64, duration: u32) -> ApiResult<Ack> {
        let (status, body) = self.send_json(
            "PUT",
            &self.location_url(location, &format!("content/{}/duration", id)),
            &json!({ "duration": duration }),
        )?;
        decode_ack(status, &body)
    }

    pub fn update_active(&self, location: &str, id: i64, is_active: bool) -> ApiResult<Ack> {
        let (status, body) = self.send_json(
            "PUT",
            &self.location_url(location, &format!("content/{}/active", id)),
            &json!({ "is_active": is_active }),
        )?;
        decode_ack(status, &body)
    }

    pub fn delete_content(&self, location: &str, id: i64) -> ApiResult<Ack> {
        let (status, body) = self.delete(&self.location_url(location, &format!("content/{}", id)))?;
        decode_ack(status, &body)
    }

    pub fn clear_content(&self, location: &str) -> ApiResult<Ack> {
        let (status, body) = self.delete(&self.location_url(location, "content/clear"))?;
        decode_ack(status, &body)
    }

    /// Ask the server to re-measure stored video durations
    pub fn fix_video_durations(&self, location: &str) -> ApiResult<Ack> {
        let (status, body) = self.post_empty(&self.location_url(location, "content/fix-video-durations"))?;
        decode_ack(status, &body)
    }

    pub fn system_info(&self) -> ApiResult<SystemInfo> {
        let (status, body) = self.get(&format!("{}/api/system/info", self.server))?;
        decode_system_info(status, &body)
    }

    /// Stream files to the server as one multipart request
    pub fn upload(
        &self,
        location: &str,
        files: &[PathBuf],
        duration: Option<u32>,
        progress: ProgressCallback,
    ) -> ApiResult<UploadOutcome> {
        let mut form = MultipartBody::new();
        for path in files {
            let size = std::fs::metadata(path)?.len();
            form = form.file("file", path, size);
        }
        if let Some(duration) = duration {
            form = form.text("duration", &duration.to_string());
        }

        let total = form.content_length();
        let content_type = form.content_type();
        let reader = ProgressReader::new(form.into_reader()?, total, progress);

        let url = self.location_url(location, "content/upload");
        log::info!("Uploading {} file(s), {} bytes to {}", files.len(), total, url);

        // Large videos over Wi-Fi need far more than the JSON timeout
        let agent = Self::create_agent(Duration::from_secs(30 * 60));
        let response = agent
            .post(&url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .header("Content-Type", &content_type)
            .header("Content-Length", &total.to_string())
            .send(ureq::SendBody::from_owned_reader(reader))?;
        let (status, body) = Self::read(response)?;
        decode_upload(status, &body)
    }
}

pub fn order_payload(ids: &[i64]) -> Value {
    let order: Vec<Value> = ids
        .iter()
        .enumerate()
        .map(|(rank, id)| json!({ "id": id, "order": rank }))
        .collect();
    json!({ "order": order })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_content_sorts_by_order() {
        let body = r#"{"success": true, "display_running": false, "content": [
            {"id": 11, "filename": "b.png", "type": "image", "order": 1, "duration": 7},
            {"id": 10, "filename": "a.mp4", "type": "video", "order": 0, "duration": 31}
        ]}"#;
        let snapshot = decode_content(200, body).unwrap();
        let ids: Vec<i64> = snapshot.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![10, 11]);
        assert_eq!(snapshot.display_running, Some(false));
    }

    #[test]
    fn test_decode_content_missing_list_is_malformed() {
        let err = decode_content(200, r#"{"success": true}"#).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));

        let err = decode_content(200, "<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn test_rejection_carries_server_reason() {
        let err = decode_ack(400, r#"{"success": false, "error": "Playlist is empty"}"#).unwrap_err();
        assert_eq!(err.user_message("Could not start playback"), "Playlist is empty");

        let err = decode_ack(500, "Internal Server Error").unwrap_err();
        assert!(matches!(err, ApiError::Rejected { status: 500, reason: None }));
        assert_eq!(err.user_message("Could not start playback"), "Could not start playback");
    }

    #[test]
    fn test_ack_without_success_flag() {
        let ack = decode_ack(200, r#"{"message": "Order updated"}"#).unwrap();
        assert!(ack.is_success());
        assert!(decode_ack(200, r#"{"error": "Invalid data"}"#).is_err());
    }

    #[test]
    fn test_decode_display_status() {
        let playing = decode_display_status(
            200,
            r#"{"success": true, "status": "playing", "location": "belediye",
                "current_item": {"id": 3, "filename": "x.png", "order": 0, "type": "image"}}"#,
        ).unwrap();
        assert!(playing.is_playing());
        assert_eq!(playing.current_item.map(|i| i.id), Some(3));

        let stopped = decode_display_status(
            200,
            r#"{"success": true, "status": "stopped", "current_item": {"id": 3, "filename": "x.png", "type": "image"}}"#,
        ).unwrap();
        assert_eq!(stopped.current_item, None);
    }

    #[test]
    fn test_decode_upload_single_and_many() {
        let single = decode_upload(
            200,
            r#"{"content": {"id": 7, "filename": "ad1.jpg", "type": "image", "duration": 10, "order": 0}}"#,
        ).unwrap();
        assert_eq!(single.items[0].filename, "ad1.jpg");

        let many = decode_upload(
            200,
            r#"{"success": true, "message": "2 files uploaded", "content": [
                {"id": 1, "filename": "a.png", "type": "image"},
                {"id": 2, "filename": "b.png", "type": "image"}]}"#,
        ).unwrap();
        assert_eq!(many.items.len(), 2);
        assert_eq!(many.message.as_deref(), Some("2 files uploaded"));
    }

    #[test]
    fn test_order_payload_ranks() {
        let payload = order_payload(&[5, 2, 9]);
        assert_eq!(
            payload,
            json!({"order": [{"id": 5, "order": 0}, {"id": 2, "order": 1}, {"id": 9, "order": 2}]})
        );
    }

    #[test]
    fn test_urls_are_encoded() {
        let client = PanelClient::new("http://10.0.0.5:5000/");
        assert_eq!(client.server(), "http://10.0.0.5:5000");
        assert_eq!(
            client.media_url("belediye", "kış kampanyası.png"),
            "http://10.0.0.5:5000/uploads/belediye/k%C4%B1%C5%9F%20kampanyas%C4%B1.png"
        );
        assert_eq!(client.screen_url("havuzbasi"), "http://10.0.0.5:5000/screenhavuzbasi");
        assert_eq!(
            client.location_url("belediye", "content/12/duration"),
            "http://10.0.0.5:5000/api/belediye/content/12/duration"
        );
    }
}

//! Real-time push channel (Socket.IO over Engine.IO v4 long-polling)
//!
//! The signage server fans out `display_status` and `content_updated`
//! events to every connected panel. Only the HTTP polling transport is
//! spoken; it rides on the same ureq stack as the REST client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::ApiError;
use crate::models::*;

/// Engine.IO payload record separator
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Pause between reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Decoded server push, forwarded to the UI thread
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Connected,
    Disconnected(String),
    DisplayStatus(DisplayStatusEvent),
    ContentUpdated(ContentUpdatedEvent),
    SystemInfo(SystemInfo),
    ServerError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(String),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut chars = raw.chars();
        let kind = chars.next()?;
        let data = chars.as_str().to_string();
        match kind {
            '0' => Some(EnginePacket::Open(data)),
            '1' => Some(EnginePacket::Close),
            '2' => Some(EnginePacket::Ping(data)),
            '3' => Some(EnginePacket::Pong(data)),
            '4' => Some(EnginePacket::Message(data)),
            '5' => Some(EnginePacket::Upgrade),
            '6' => Some(EnginePacket::Noop),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(data) => format!("0{}", data),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Split a polling response body into engine packets, skipping garbage
pub fn split_payload(body: &str) -> Vec<EnginePacket> {
    body.split(RECORD_SEPARATOR)
        .filter(|p| !p.is_empty())
        .filter_map(|p| {
            let packet = EnginePacket::parse(p);
            if packet.is_none() {
                log::debug!("Skipping unknown engine packet: {:.40}", p);
            }
            packet
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect,
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(String),
    Other,
}

impl SocketPacket {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut chars = raw.chars();
        let kind = chars.next()?;
        let mut rest = chars.as_str();

        // Optional "/namespace," prefix
        if rest.starts_with('/') {
            rest = rest.split_once(',').map(|(_, tail)| tail).unwrap_or("");
        }

        match kind {
            '0' => Some(SocketPacket::Connect),
            '1' => Some(SocketPacket::Disconnect),
            '2' => {
                // Optional ack id before the JSON array
                let json_start = rest.find('[')?;
                let args: Vec<Value> = serde_json::from_str(&rest[json_start..]).ok()?;
                let mut args = args.into_iter();
                let name = args.next()?.as_str()?.to_string();
                let data = args.next().unwrap_or(Value::Null);
                Some(SocketPacket::Event { name, data })
            }
            '4' => {
                let reason = serde_json::from_str::<Value>(rest)
                    .ok()
                    .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                    .unwrap_or_else(|| rest.to_string());
                Some(SocketPacket::ConnectError(reason))
            }
            '3' | '5' | '6' => Some(SocketPacket::Other),
            _ => None,
        }
    }
}

/// Engine message carrying a socket event, e.g. `42["join_location",{..}]`
pub fn encode_event(name: &str, data: Option<&Value>) -> String {
    let args = match data {
        Some(data) => json!([name, data]),
        None => json!([name]),
    };
    EnginePacket::Message(format!("2{}", args)).encode()
}

/// Map a named socket event to a push event; `None` for events the panel ignores
pub fn decode_event(name: &str, data: Value) -> Option<PushEvent> {
    let decoded = match name {
        "display_status" => serde_json::from_value(data).map(PushEvent::DisplayStatus),
        "content_updated" => serde_json::from_value(data).map(PushEvent::ContentUpdated),
        "system_info" => serde_json::from_value(data).map(PushEvent::SystemInfo),
        "error" => {
            let message = data
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Server error")
                .to_string();
            Ok(PushEvent::ServerError(message))
        }
        other => {
            log::debug!("Ignoring push event '{}'", other);
            return None;
        }
    };
    match decoded {
        Ok(event) => Some(event),
        Err(e) => {
            log::warn!("Dropping malformed '{}' event: {}", name, e);
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Handshake {
    sid: String,
    #[serde(default = "default_ping_interval")]
    ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    ping_timeout: u64,
}

fn default_ping_interval() -> u64 { 25_000 }
fn default_ping_timeout() -> u64 { 20_000 }

fn parse_handshake(body: &str) -> Result<Handshake, ApiError> {
    match split_payload(body).into_iter().next() {
        Some(EnginePacket::Open(data)) => {
            serde_json::from_str(&data).map_err(|e| ApiError::Malformed(e.to_string()))
        }
        _ => Err(ApiError::Malformed(format!("unexpected handshake: {:.60}", body))),
    }
}

/// Shared between the polling thread and emitters on the UI thread
struct Transport {
    base: String,
    agent: ureq::Agent,
    sid: Mutex<Option<String>>,
}

impl Transport {
    fn url(&self, sid: Option<&str>) -> String {
        let t = chrono::Utc::now().timestamp_millis();
        match sid {
            Some(sid) => format!("{}/socket.io/?EIO=4&transport=polling&t={}&sid={}", self.base, t, sid),
            None => format!("{}/socket.io/?EIO=4&transport=polling&t={}", self.base, t),
        }
    }

    fn current_sid(&self) -> Option<String> {
        self.sid.lock().ok().and_then(|s| s.clone())
    }

    fn set_sid(&self, sid: Option<String>) {
        if let Ok(mut slot) = self.sid.lock() {
            *slot = sid;
        }
    }

    fn get(&self, url: &str) -> Result<String, ApiError> {
        let mut response = self.agent.get(url).call()?;
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;
        if status >= 400 {
            return Err(ApiError::Rejected { status, reason: Some(body) });
        }
        Ok(body)
    }

    fn post(&self, sid: &str, packets: &[String]) -> Result<(), ApiError> {
        let body = packets.join(&RECORD_SEPARATOR.to_string());
        let mut response = self
            .agent
            .post(&self.url(Some(sid)))
            .header("Content-Type", "text/plain;charset=UTF-8")
            .send(body)?;
        let status = response.status().as_u16();
        if status >= 400 {
            let reason = response.body_mut().read_to_string().ok();
            return Err(ApiError::Rejected { status, reason });
        }
        Ok(())
    }
}

/// Background connection to the server's push channel
pub struct PushChannel {
    transport: Arc<Transport>,
    location: Arc<Mutex<String>>,
    shutdown: Arc<AtomicBool>,
}

impl PushChannel {
    /// Start the polling thread; events arrive on `tx` until shutdown
    pub fn spawn(base: &str, location: &str, tx: Sender<PushEvent>) -> Self {
        // Long-polls are held open for up to pingInterval by the server
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(60)))
            .timeout_connect(Some(Duration::from_secs(10)))
            .http_status_as_error(false)
            .build()
            .new_agent();

        let channel = Self {
            transport: Arc::new(Transport {
                base: base.trim_end_matches('/').to_string(),
                agent,
                sid: Mutex::new(None),
            }),
            location: Arc::new(Mutex::new(location.to_string())),
            shutdown: Arc::new(AtomicBool::new(false)),
        };

        let transport = Arc::clone(&channel.transport);
        let location = Arc::clone(&channel.location);
        let shutdown = Arc::clone(&channel.shutdown);
        thread::spawn(move || run(transport, location, shutdown, tx));

        channel
    }

    /// Subscribe to another location's room
    pub fn join_location(&self, location: &str) {
        if let Ok(mut current) = self.location.lock() {
            *current = location.to_string();
        }
        self.emit("join_location", Some(json!({ "location": location })));
    }

    /// Fire-and-forget event emission; dropped while disconnected
    pub fn emit(&self, name: &str, data: Option<Value>) {
        let Some(sid) = self.transport.current_sid() else {
            log::debug!("Push channel offline, not sending '{}'", name);
            return;
        };
        let transport = Arc::clone(&self.transport);
        let packet = encode_event(name, data.as_ref());
        let name = name.to_string();
        thread::spawn(move || {
            if let Err(e) = transport.post(&sid, &[packet]) {
                log::warn!("Failed to send '{}' event: {}", name, e);
            }
        });
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    transport: Arc<Transport>,
    location: Arc<Mutex<String>>,
    shutdown: Arc<AtomicBool>,
    tx: Sender<PushEvent>,
) {
    log::info!("Push channel starting for {}", transport.base);
    while !shutdown.load(Ordering::SeqCst) {
        let mut connected = false;
        let reason = match session(&transport, &location, &shutdown, &tx, &mut connected) {
            Ok(()) => "connection closed".to_string(),
            Err(e) => e.to_string(),
        };
        transport.set_sid(None);

        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if connected {
            log::warn!("Push channel disconnected: {}", reason);
        } else {
            log::debug!("Push channel unavailable: {}", reason);
        }
        if tx.send(PushEvent::Disconnected(reason)).is_err() {
            break;
        }

        // Sleep in slices so shutdown is noticed promptly
        let mut waited = Duration::ZERO;
        while waited < RECONNECT_DELAY && !shutdown.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            waited += Duration::from_millis(100);
        }
    }
    log::info!("Push channel stopped");
}

fn session(
    transport: &Transport,
    location: &Mutex<String>,
    shutdown: &AtomicBool,
    tx: &Sender<PushEvent>,
    connected: &mut bool,
) -> Result<(), ApiError> {
    let handshake = parse_handshake(&transport.get(&transport.url(None))?)?;
    log::debug!(
        "Engine session {} (ping {}ms / timeout {}ms)",
        handshake.sid, handshake.ping_interval, handshake.ping_timeout
    );
    let sid = handshake.sid;
    transport.set_sid(Some(sid.clone()));
    transport.post(&sid, &[EnginePacket::Message("0".to_string()).encode()])?;

    while !shutdown.load(Ordering::SeqCst) {
        let body = transport.get(&transport.url(Some(&sid)))?;
        for packet in split_payload(&body) {
            match packet {
                EnginePacket::Ping(data) => {
                    transport.post(&sid, &[EnginePacket::Pong(data).encode()])?;
                }
                EnginePacket::Close => return Ok(()),
                EnginePacket::Message(data) => match SocketPacket::parse(&data) {
                    Some(SocketPacket::Connect) => {
                        *connected = true;
                        log::info!("Push channel connected");
                        if tx.send(PushEvent::Connected).is_err() {
                            return Ok(());
                        }
                        let current = location.lock().map(|l| l.clone()).unwrap_or_default();
                        transport.post(
                            &sid,
                            &[
                                encode_event("join_location", Some(&json!({ "location": current }))),
                                encode_event("get_system_info", None),
                            ],
                        )?;
                    }
                    Some(SocketPacket::Disconnect) => return Ok(()),
                    Some(SocketPacket::ConnectError(reason)) => {
                        return Err(ApiError::Rejected { status: 0, reason: Some(reason) });
                    }
                    Some(SocketPacket::Event { name, data }) => {
                        if let Some(event) = decode_event(&name, data) {
                            if tx.send(event).is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Some(SocketPacket::Other) | None => {}
                },
                EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
            }
        }
    }
    // Polite close so the server drops the session immediately
    transport.post(&sid, &[EnginePacket::Close.encode()]).ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_payload() {
        let body = "2\u{1e}42[\"display_status\",{\"location\":\"belediye\",\"status\":\"stopped\"}]\u{1e}6";
        let packets = split_payload(body);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0], EnginePacket::Ping(String::new()));
        assert!(matches!(packets[1], EnginePacket::Message(ref m) if m.starts_with("2[")));
        assert_eq!(packets[2], EnginePacket::Noop);
    }

    #[test]
    fn test_parse_handshake() {
        let body = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":5000,"maxPayload":1000000}"#;
        let hs = parse_handshake(body).unwrap();
        assert_eq!(hs.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(hs.ping_timeout, 5000);
        assert!(parse_handshake("4hello").is_err());
    }

    #[test]
    fn test_socket_event_with_namespace_and_ack() {
        let packet = SocketPacket::parse(r#"2/admin,12["content_updated",{"action":"sync"}]"#).unwrap();
        match packet {
            SocketPacket::Event { name, data } => {
                assert_eq!(name, "content_updated");
                assert_eq!(data["action"], "sync");
            }
            other => panic!("unexpected packet {:?}", other),
        }
        assert_eq!(SocketPacket::parse(r#"0{"sid":"abc"}"#), Some(SocketPacket::Connect));
        assert_eq!(
            SocketPacket::parse(r#"4{"message":"Not authorized"}"#),
            Some(SocketPacket::ConnectError("Not authorized".to_string()))
        );
    }

    #[test]
    fn test_encode_event() {
        assert_eq!(
            encode_event("join_location", Some(&json!({"location": "belediye"}))),
            r#"42["join_location",{"location":"belediye"}]"#
        );
        assert_eq!(encode_event("get_system_info", None), r#"42["get_system_info"]"#);
    }

    #[test]
    fn test_decode_display_status_event() {
        let event = decode_event(
            "display_status",
            json!({"location": "belediye", "status": "playing",
                   "current_item": {"id": 3, "filename": "x.png", "order": 0, "type": "image"}}),
        );
        match event {
            Some(PushEvent::DisplayStatus(ev)) => {
                assert_eq!(ev.status, PlaybackStatus::Playing);
                assert_eq!(ev.current_item.map(|i| i.filename), Some("x.png".to_string()));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_ignores_unknown_and_malformed() {
        assert_eq!(decode_event("chat", json!({})), None);
        assert_eq!(decode_event("display_status", json!({"status": "paused"})), None);
        assert_eq!(
            decode_event("error", json!({"message": "Bağlantı hatası"})),
            Some(PushEvent::ServerError("Bağlantı hatası".to_string()))
        );
    }
}

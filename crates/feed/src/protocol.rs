//! Centrifuge JSON client protocol frames
//!
//! Commands carry an `id` and one method body (`connect`, `subscribe`).
//! The server answers with replies echoing that `id`, pushes publications
//! without one, and pings with an empty object. Several frames may share a
//! single WebSocket text message, separated by newlines.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use monitor_core::{FeedError, FeedResult};

/// Client -> server command
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<ConnectRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<SubscribeRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub channel: String,
}

impl Command {
    pub fn connect(id: u32, name: &str, token: Option<&str>) -> Self {
        Self {
            id,
            connect: Some(ConnectRequest {
                name: name.to_string(),
                token: token.map(str::to_string),
            }),
            subscribe: None,
        }
    }

    pub fn subscribe(id: u32, channel: &str) -> Self {
        Self {
            id,
            connect: None,
            subscribe: Some(SubscribeRequest {
                channel: channel.to_string(),
            }),
        }
    }

    pub fn to_json(&self) -> FeedResult<String> {
        serde_json::to_string(self).map_err(|e| FeedError::InvalidMessage(e.to_string()))
    }
}

/// Pong sent back for a server ping
pub const PONG: &str = "{}";

/// Result of a successful connect command
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectResult {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub version: String,
    /// Server ping interval in seconds, 0 when pings are disabled
    #[serde(default)]
    pub ping: u32,
    /// Whether the server expects a pong for each ping
    #[serde(default)]
    pub pong: bool,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    error: Option<RawError>,
    #[serde(default)]
    connect: Option<ConnectResult>,
    #[serde(default)]
    subscribe: Option<Value>,
    #[serde(default)]
    push: Option<RawPush>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    temporary: bool,
}

#[derive(Debug, Deserialize)]
struct RawPush {
    #[serde(default)]
    channel: String,
    #[serde(rename = "pub", default)]
    publication: Option<RawPublication>,
    #[serde(default)]
    disconnect: Option<RawDisconnect>,
}

#[derive(Debug, Deserialize)]
struct RawPublication {
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct RawDisconnect {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    reason: String,
}

/// Decoded server -> client frame
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Ping,
    Connected { id: u32, result: ConnectResult },
    Subscribed { id: u32 },
    Error {
        id: Option<u32>,
        code: u32,
        message: String,
        temporary: bool,
    },
    Publication { channel: String, data: Value },
    Disconnect { code: u32, reason: String },
    Other,
}

/// Disconnect codes after which the server expects no reconnect
pub fn is_terminal_disconnect(code: u32) -> bool {
    matches!(code, 3500..=3999 | 4500..=4999)
}

/// Connect error replies below 100 are internal, the rest are final unless
/// the server flags them temporary
pub fn is_terminal_error(code: u32, temporary: bool) -> bool {
    code >= 100 && !temporary
}

/// Decode a single frame
pub fn decode_frame(line: &str) -> FeedResult<ServerFrame> {
    let raw: RawFrame =
        serde_json::from_str(line).map_err(|e| FeedError::InvalidMessage(e.to_string()))?;

    if let Some(error) = raw.error {
        return Ok(ServerFrame::Error {
            id: raw.id,
            code: error.code,
            message: error.message,
            temporary: error.temporary,
        });
    }

    if let Some(push) = raw.push {
        if let Some(publication) = push.publication {
            return Ok(ServerFrame::Publication {
                channel: push.channel,
                data: publication.data,
            });
        }
        if let Some(disconnect) = push.disconnect {
            return Ok(ServerFrame::Disconnect {
                code: disconnect.code,
                reason: disconnect.reason,
            });
        }
        return Ok(ServerFrame::Other);
    }

    match raw.id {
        Some(id) => {
            if let Some(result) = raw.connect {
                Ok(ServerFrame::Connected { id, result })
            } else if raw.subscribe.is_some() {
                Ok(ServerFrame::Subscribed { id })
            } else {
                Ok(ServerFrame::Other)
            }
        }
        None if raw.connect.is_none() && raw.subscribe.is_none() => Ok(ServerFrame::Ping),
        None => Ok(ServerFrame::Other),
    }
}

/// Decode every newline-separated frame in a text message
pub fn decode_message(text: &str) -> Vec<FeedResult<ServerFrame>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(decode_frame)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connect_command_shape() {
        let json = Command::connect(1, "trading-monitor", None).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({"id": 1, "connect": {"name": "trading-monitor"}}));

        let json = Command::subscribe(2, "kline").to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({"id": 2, "subscribe": {"channel": "kline"}}));
    }

    #[test]
    fn test_decode_replies() {
        let frame = decode_frame(r#"{"id":1,"connect":{"client":"abc","version":"0.0.0","ping":25,"pong":true}}"#)
            .unwrap();
        assert_eq!(
            frame,
            ServerFrame::Connected {
                id: 1,
                result: ConnectResult {
                    client: "abc".to_string(),
                    version: "0.0.0".to_string(),
                    ping: 25,
                    pong: true,
                },
            }
        );

        assert_eq!(decode_frame(r#"{"id":2,"subscribe":{}}"#).unwrap(), ServerFrame::Subscribed { id: 2 });
        assert_eq!(decode_frame("{}").unwrap(), ServerFrame::Ping);

        let frame = decode_frame(r#"{"id":3,"error":{"code":103,"message":"permission denied"}}"#).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Error {
                id: Some(3),
                code: 103,
                message: "permission denied".to_string(),
                temporary: false,
            }
        );

        let frame = decode_frame(r#"{"id":1,"error":{"code":100,"message":"internal server error","temporary":true}}"#)
            .unwrap();
        assert!(matches!(frame, ServerFrame::Error { temporary: true, .. }));
    }

    #[test]
    fn test_terminal_codes() {
        assert!(!is_terminal_disconnect(3000));
        assert!(!is_terminal_disconnect(3001));
        assert!(is_terminal_disconnect(3500));
        assert!(is_terminal_disconnect(3501));
        assert!(!is_terminal_disconnect(4000));
        assert!(is_terminal_disconnect(4999));
        assert!(!is_terminal_disconnect(1000));

        assert!(!is_terminal_error(2, false));
        assert!(!is_terminal_error(100, true));
        assert!(is_terminal_error(101, false));
    }

    #[test]
    fn test_decode_pushes() {
        let frame = decode_frame(r#"{"push":{"channel":"kline","pub":{"data":{"close":"96012.5"}}}}"#).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Publication {
                channel: "kline".to_string(),
                data: json!({"close": "96012.5"}),
            }
        );

        let frame = decode_frame(r#"{"push":{"disconnect":{"code":3001,"reason":"shutdown"}}}"#).unwrap();
        assert_eq!(
            frame,
            ServerFrame::Disconnect {
                code: 3001,
                reason: "shutdown".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_batched_message() {
        let text = "{}\n{\"push\":{\"channel\":\"wallet\",\"pub\":{\"data\":{\"usdt\":1}}}}\nnot json\n";
        let frames = decode_message(text);

        assert_eq!(frames.len(), 3);
        assert!(matches!(frames[0], Ok(ServerFrame::Ping)));
        assert!(matches!(frames[1], Ok(ServerFrame::Publication { .. })));
        assert!(frames[2].is_err());
    }
}

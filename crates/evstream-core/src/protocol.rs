//! Protocol shapes for the inspector connection.
//!
//! Requests are routed on their `type` tag alone (tolerant reader: extra
//! fields are ignored). Event records themselves stay opaque
//! `serde_json::Value` payloads end to end.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hello frame a peer must send as the first line of every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Instance identity the peer claims to share with the daemon.
    pub sender: String,
}

/// Inbound request kinds understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Fetch the full set of stored records.
    GetData,
    /// Clear the store and confirm completion.
    Reset,
}

/// Errors produced while routing an inbound message.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The message carries no string `type` field.
    #[error("Message has no 'type' field")]
    MissingType,

    /// The `type` value is not one the relay routes.
    #[error("Unexpected message type {0}")]
    UnexpectedType(String),
}

/// Route an inbound message on its `type` tag.
pub fn parse_request(raw: &Value) -> Result<Request, ParseError> {
    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingType)?;

    match kind {
        "get-data" => Ok(Request::GetData),
        "reset" => Ok(Request::Reset),
        other => Err(ParseError::UnexpectedType(other.to_string())),
    }
}

/// Responses posted to the inspector peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Response {
    /// Full contents of the event store at the time of the request.
    ReceiveData { data: Vec<Value> },
    /// Confirmation that the store was cleared.
    ResetFinished,
}

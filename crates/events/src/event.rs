//! The progress event frame.

use serde::{Deserialize, Serialize};

/// Kind of a progress frame, serialized in upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Log,
    Done,
    Error,
}

/// A transient progress message. Never persisted.
///
/// Serializes as `{"type": "LOG", "message": "..."}`; `payload` appears only
/// on `DONE` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ProgressEvent {
    pub fn log(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Log,
            message: message.into(),
            payload: None,
        }
    }

    pub fn done(message: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: EventKind::Done,
            message: message.into(),
            payload: Some(payload),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            message: message.into(),
            payload: None,
        }
    }

    /// `DONE` and `ERROR` end a job's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Done | EventKind::Error)
    }

    /// Encode as the JSON text frame sent over the bus and to clients.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    /// Copy without the payload and with the message cut to at most
    /// `max_message_bytes` (on a char boundary).
    ///
    /// A `DONE` event without a payload is a marker: the result is read
    /// from the job record.
    pub fn slimmed(&self, max_message_bytes: usize) -> Self {
        Self {
            kind: self.kind,
            message: truncate_utf8(&self.message, max_message_bytes).to_string(),
            payload: None,
        }
    }

    /// Encode as a frame of at most `limit` bytes.
    ///
    /// An oversized frame first loses its payload, then its message is
    /// shortened until it fits.
    pub fn to_frame_within(&self, limit: usize) -> Result<String, serde_json::Error> {
        let frame = self.to_frame()?;
        if frame.len() <= limit {
            return Ok(frame);
        }

        let mut budget = self.message.len();
        loop {
            let frame = self.slimmed(budget).to_frame()?;
            if frame.len() <= limit || budget == 0 {
                return Ok(frame);
            }
            budget /= 2;
        }
    }
}

fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

//! Inbound peer commands and the frame assembler that produces them.
//!
//! Peers write newline-terminated JSON objects to the RX characteristic in
//! chunks of at most 20 bytes.  [`FrameAssembler`] stitches the chunks back
//! together in main-loop context; [`PeerCommand::parse`] validates a frame.
//!
//! ```json
//! {"type":"wifi","ssid":"lab","password":"hunter22"}
//! {"type":"threshold","temp_high":28,"temp_low":"12.5"}
//! ```

use heapless::Vec;
use log::debug;
use serde_json::Value;

use crate::error::CommandError;

/// Longest frame the assembler keeps.  Longer frames are truncated and
/// rejected as [`CommandError::FrameTooLong`].
pub const FRAME_CAPACITY: usize = 256;

pub type FrameBytes = Vec<u8, FRAME_CAPACITY>;

// ───────────────────────────────────────────────────────────────
// Frame assembly
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: FrameBytes,
    /// The peer sent more than [`FRAME_CAPACITY`] bytes before the newline.
    pub truncated: bool,
}

#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: FrameBytes,
    overflowed: bool,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk.  Returns the most recent frame completed by this
    /// chunk; earlier frames completed by the same chunk are superseded.
    ///
    /// A chunk that opens an object (`{`) while the buffered bytes can no
    /// longer become valid JSON starts a new frame; the stale bytes go.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Frame> {
        let mut latest = None;
        let mut segments = chunk.split(|&b| b == b'\n');

        // The first segment continues whatever is buffered.
        if let Some(first) = segments.next() {
            let mark = self.buf.len();
            self.extend(first);
            if mark > 0 && starts_with_brace(first) && !is_json_prefix(&self.buf) {
                debug!("Frame: {} stale bytes dropped on resync", mark);
                self.clear();
                self.extend(first);
            }
        }

        // Every further segment follows a newline.
        for segment in segments {
            let frame = self.take();
            if frame.truncated || !is_blank(&frame.bytes) {
                latest = Some(frame);
            }
            self.extend(segment);
        }

        // Peers that omit the newline still get through once the buffer
        // holds one complete object.
        if !self.overflowed && is_complete_object(&self.buf) {
            latest = Some(self.take());
        }

        latest
    }

    /// Bytes buffered towards the next frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop the partial frame, e.g. when the peer that sent it left.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }

    fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.buf.push(b).is_err() {
                self.overflowed = true;
                break;
            }
        }
    }

    fn take(&mut self) -> Frame {
        let frame = Frame {
            bytes: core::mem::take(&mut self.buf),
            truncated: self.overflowed,
        };
        self.overflowed = false;
        frame
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn starts_with_brace(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'{')
}

/// `true` while more input could still turn `bytes` into one JSON value.
fn is_json_prefix(bytes: &[u8]) -> bool {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(_) => true,
        Err(e) => e.is_eof(),
    }
}

fn is_complete_object(bytes: &[u8]) -> bool {
    starts_with_brace(bytes) && serde_json::from_slice::<Value>(bytes).is_ok_and(|v| v.is_object())
}

// ───────────────────────────────────────────────────────────────
// Command model
// ───────────────────────────────────────────────────────────────

/// A validated request from a BLE peer.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCommand {
    /// Replace WiFi credentials and switch to the WiFi channel.
    Wifi {
        ssid: heapless::String<32>,
        password: heapless::String<64>,
    },
    /// Replace the alert thresholds.
    Threshold { temp_high: f32, temp_low: f32 },
    /// Frame was not JSON; raw bytes kept for logging.
    Raw(FrameBytes),
    /// Well-formed JSON with a known `type` whose fields failed validation.
    Rejected(CommandError),
    /// JSON object whose `type` this firmware does not implement.
    Unrecognized(heapless::String<24>),
}

impl PeerCommand {
    pub fn parse(frame: &Frame) -> Self {
        if frame.truncated {
            return Self::Rejected(CommandError::FrameTooLong);
        }
        let Ok(value) = serde_json::from_slice::<Value>(&frame.bytes) else {
            return Self::Raw(frame.bytes.clone());
        };
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Self {
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Self::Rejected(CommandError::MissingType);
        };
        match kind {
            "wifi" => parse_wifi(value).unwrap_or_else(Self::Rejected),
            "threshold" => parse_threshold(value).unwrap_or_else(Self::Rejected),
            other => {
                let mut name = heapless::String::new();
                for c in other.chars() {
                    if name.push(c).is_err() {
                        break;
                    }
                }
                Self::Unrecognized(name)
            }
        }
    }
}

fn parse_wifi(value: &Value) -> Result<PeerCommand, CommandError> {
    let ssid = value
        .get("ssid")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty() && s.len() <= 32 && is_printable_ascii(s))
        .ok_or(CommandError::InvalidSsid)?;

    // A missing password means an open network.
    let password = match value.get("password") {
        None | Some(Value::Null) => "",
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(CommandError::InvalidPassword),
    };
    if !password.is_empty() && !(8..=64).contains(&password.len()) {
        return Err(CommandError::InvalidPassword);
    }

    Ok(PeerCommand::Wifi {
        ssid: heapless::String::try_from(ssid).map_err(|()| CommandError::InvalidSsid)?,
        password: heapless::String::try_from(password)
            .map_err(|()| CommandError::InvalidPassword)?,
    })
}

fn parse_threshold(value: &Value) -> Result<PeerCommand, CommandError> {
    let temp_high = numeric_field(value, "temp_high")?;
    let temp_low = numeric_field(value, "temp_low")?;
    Ok(PeerCommand::Threshold {
        temp_high,
        temp_low,
    })
}

/// A JSON number, or a string holding one.  Must be finite as `f32`.
fn numeric_field(value: &Value, key: &str) -> Result<f32, CommandError> {
    let v = match value.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    v.map(|v| v as f32)
        .filter(|v| v.is_finite())
        .ok_or(CommandError::InvalidThreshold)
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

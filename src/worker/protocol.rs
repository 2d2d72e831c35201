//! Wire format between the front-end and the worker, and between the worker
//! and each evaluation child.
//!
//! Requests (front-end → worker) are framed as one tag byte, a 4-byte
//! big-endian payload length and the payload. Replies (worker → front-end)
//! are a single status byte; `Candidates` is followed by a length-prefixed
//! JSON list.

use serde::{Deserialize, Serialize};

use crate::error::{ReplError, Result};
use crate::value::Scope;

/// Largest payload accepted in one frame (16 MiB).
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Status byte sent from the worker to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// The statement evaluated successfully.
    Done = 0,
    /// User code asked to exit; the worker is terminating.
    Exited = 1,
    /// The statement failed; failure hooks have run.
    Failed = 2,
    /// Startup is complete.
    Ready = 3,
    /// The evaluation was interrupted.
    Cancelled = 4,
    /// Completion candidates follow.
    Candidates = 5,
}

impl Status {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        Ok(match byte {
            0 => Self::Done,
            1 => Self::Exited,
            2 => Self::Failed,
            3 => Self::Ready,
            4 => Self::Cancelled,
            5 => Self::Candidates,
            other => {
                return Err(ReplError::Protocol(format!(
                    "unknown status byte {other:#04x}"
                )));
            }
        })
    }
}

/// Request sent from the front-end to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Evaluate one complete statement.
    Eval(String),
    /// List completion candidates for a word.
    Complete(String),
    /// Stop the worker.
    Shutdown,
}

impl Request {
    const EVAL: u8 = b'e';
    const COMPLETE: u8 = b'c';
    const SHUTDOWN: u8 = b'q';

    pub fn tag(&self) -> u8 {
        match self {
            Self::Eval(_) => Self::EVAL,
            Self::Complete(_) => Self::COMPLETE,
            Self::Shutdown => Self::SHUTDOWN,
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            Self::Eval(code) => code.as_bytes(),
            Self::Complete(word) => word.as_bytes(),
            Self::Shutdown => &[],
        }
    }

    /// Encode as tag + length + payload.
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut frame = Vec::with_capacity(5 + payload.len());
        frame.push(self.tag());
        frame.extend_from_slice(&encode_len(payload.len()));
        frame.extend_from_slice(payload);
        frame
    }

    /// Rebuild a request from a decoded tag and payload.
    pub fn from_parts(tag: u8, payload: Vec<u8>) -> Result<Self> {
        match tag {
            Self::EVAL => Ok(Self::Eval(utf8(payload)?)),
            Self::COMPLETE => Ok(Self::Complete(utf8(payload)?)),
            Self::SHUTDOWN => Ok(Self::Shutdown),
            other => Err(ReplError::Protocol(format!(
                "unknown request tag {other:#04x}"
            ))),
        }
    }
}

fn utf8(payload: Vec<u8>) -> Result<String> {
    String::from_utf8(payload)
        .map_err(|e| ReplError::Protocol(format!("request payload is not UTF-8: {e}")))
}

pub fn encode_len(len: usize) -> [u8; 4] {
    (len as u32).to_be_bytes()
}

/// Decode a frame length, rejecting oversized payloads.
pub fn decode_len(bytes: [u8; 4]) -> Result<usize> {
    let len = u32::from_be_bytes(bytes) as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(ReplError::Protocol(format!(
            "frame of {len} bytes exceeds the {MAX_PAYLOAD_LEN} byte limit"
        )));
    }
    Ok(len)
}

/// Report an evaluation child writes to its private pipe before exiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChildReport {
    /// Evaluation finished; this is the scope it left behind.
    Completed { scope: Scope },
    /// User code asked to exit.
    Exited { code: i32 },
}

impl ChildReport {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ReplError::Protocol(format!("unreadable child report: {e}")))
    }
}

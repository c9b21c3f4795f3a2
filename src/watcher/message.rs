//! Inbound stream messages

use crate::job::Document;
use serde::Deserialize;
use serde_json::Value;

/// One JSON frame received on the job's event stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    /// Snapshot of the job's current aggregate state
    Catchup { data: CatchupData },

    /// Exactly one new document
    Document { data: Document },

    Done {},

    /// `error` is usually a string; any JSON value is accepted
    Error {
        #[serde(default)]
        error: Option<Value>,
    },
}

/// Payload of a catch-up message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatchupData {
    pub status: String,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub data: Vec<Document>,
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

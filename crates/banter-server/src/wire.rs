use serde::{Deserialize, Serialize};

use banter_core::Message;

/// Inbound client frame. Only the payload is trusted; anything else a
/// sender supplies (a uid, an id) is ignored; identity comes from the
/// session that read the frame.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub text: String,
}

/// Envelope for the history endpoint.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub status: &'static str,
    pub payload: Vec<Message>,
}

impl HistoryResponse {
    pub fn success(payload: Vec<Message>) -> Self {
        Self {
            status: "success",
            payload,
        }
    }
}

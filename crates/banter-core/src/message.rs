use serde::{Deserialize, Serialize};

/// A chat message, in the shape it crosses the wire.
///
/// The id is assigned by the store on persistence and stays empty until
/// then (or forever, when persistence failed and the message went out
/// live-only). `login` and `avatar` are denormalized display fields filled
/// in at broadcast or history-read time; they are never authoritative and
/// are omitted from the wire when empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub login: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub avatar: String,
    #[serde(default)]
    pub uid: String,
    pub text: String,
}

impl Message {
    /// A message as received from a connection: sender subject id plus
    /// payload, everything else left for the store and hub to fill.
    pub fn inbound(uid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// A server-originated message. Carries no subject and no display
    /// fields, same as an anonymous client's.
    pub fn system(text: impl Into<String>) -> Self {
        Self::inbound("", text)
    }

    pub fn is_anonymous(&self) -> bool {
        self.uid.is_empty()
    }
}

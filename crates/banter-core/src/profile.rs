use serde::{Deserialize, Serialize};

/// Display profile resolved for a connected client's subject id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Profile {
    pub login: String,
    pub avatar: String,
}

impl Profile {
    pub fn new(login: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            avatar: avatar.into(),
        }
    }
}

/// One entry of a batched profile lookup, keyed by subject id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub uid: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub avatar: String,
}

impl ProfileRecord {
    pub fn into_profile(self) -> Profile {
        Profile {
            login: self.login,
            avatar: self.avatar,
        }
    }
}

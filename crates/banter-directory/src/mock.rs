use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use banter_core::ProfileRecord;

use crate::error::DirectoryError;
use crate::profile::ProfileDirectory;
use crate::subject::{Credentials, SubjectResolver};

/// Pre-programmed subject resolution for deterministic tests: maps an
/// access token straight to a subject id.
#[derive(Default)]
pub struct MockSubjects {
    subjects: HashMap<String, String>,
}

impl MockSubjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, access_token: &str, uid: &str) -> Self {
        self.subjects.insert(access_token.into(), uid.into());
        self
    }
}

#[async_trait]
impl SubjectResolver for MockSubjects {
    async fn resolve(&self, credentials: &Credentials) -> Result<String, DirectoryError> {
        self.subjects
            .get(&credentials.access_token)
            .cloned()
            .ok_or(DirectoryError::Unauthorized)
    }
}

/// In-memory profile directory. Lookups return the known subset in batch
/// order; flip `set_failing` to simulate the service being down.
#[derive(Default)]
pub struct MockDirectory {
    records: RwLock<HashMap<String, ProfileRecord>>,
    failing: AtomicBool,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uid: &str, login: &str, avatar: &str) {
        self.records.write().insert(
            uid.into(),
            ProfileRecord {
                uid: uid.into(),
                login: login.into(),
                avatar: avatar.into(),
            },
        );
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

#[async_trait]
impl ProfileDirectory for MockDirectory {
    async fn lookup(&self, uids: &[String]) -> Result<Vec<ProfileRecord>, DirectoryError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DirectoryError::Http("mock directory down".into()));
        }
        let records = self.records.read();
        Ok(uids.iter().filter_map(|uid| records.get(uid).cloned()).collect())
    }
}

//! Per-process profile cache.
//!
//! The only shared mutable state in the orchestrator. Entries expire
//! lazily on read after five minutes; when the map is full the oldest
//! insertion is evicted. Lookup misses and load errors are never cached.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use chief_core::{UserId, UserProfile};

pub const PROFILE_TTL: Duration = Duration::from_secs(5 * 60);
pub const MAX_ENTRIES: usize = 10_000;

pub struct ProfileCache {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, (UserProfile, Instant)>>,
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::with_ttl(PROFILE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, id: &UserId) -> Option<UserProfile> {
        let mut entries = self.entries.lock().expect("profile cache poisoned");
        match entries.get(&id.0) {
            Some((_, inserted)) if inserted.elapsed() >= self.ttl => {
                entries.remove(&id.0);
                None
            }
            Some((profile, _)) => Some(profile.clone()),
            None => None,
        }
    }

    pub fn insert(&self, profile: UserProfile) {
        let mut entries = self.entries.lock().expect("profile cache poisoned");
        if entries.len() >= MAX_ENTRIES && !entries.contains_key(&profile.id.0) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (_, inserted))| *inserted)
                .map(|(key, _)| *key);
            if let Some(key) = oldest {
                entries.remove(&key);
            }
        }
        entries.insert(profile.id.0, (profile, Instant::now()));
    }

    pub fn invalidate(&self, id: &UserId) {
        self.entries.lock().expect("profile cache poisoned").remove(&id.0);
    }
}

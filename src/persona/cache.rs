use super::types::Persona;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

struct CacheEntry {
    persona: Persona,
    expires_at: Instant,
}

/// Process-local persona cache with fixed-TTL entries. Never a source of
/// truth: rebuilt from the durable store on miss. Constructed once per
/// process and passed by reference to the resolver, so it can be swapped
/// for a distributed cache without touching call sites.
///
/// Expired entries are rejected on read, so the periodic sweep only bounds
/// memory; correctness does not depend on it. Concurrent population races
/// are idempotent: last writer wins with equivalent data.
pub struct PersonaCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl PersonaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Fresh hit or nothing. A stale entry reads as a miss and is left for
    /// the sweep to reclaim.
    pub fn get(&self, key: &str) -> Option<Persona> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.persona.clone())
    }

    pub fn insert(&self, key: String, persona: Persona) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, CacheEntry {
            persona,
            expires_at,
        });
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Background sweep on a fixed interval. Optional; omitting it costs
    /// memory, not correctness.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = cache.len(), "persona cache swept");
                }
            }
        })
    }
}

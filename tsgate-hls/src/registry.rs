//! Stream registry.
//!
//! Process-wide map from source fingerprint to live session. Concurrent
//! viewers of one source get one session; idle sessions expire on a sliding
//! TTL, their producers observe the eviction and tear down.

use crate::config::GatewayConfig;
use crate::session::StreamSession;

use bytes::Bytes;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// 128-bit hash of the verbatim source URL, as lowercase hex. Registry key
/// and path component of segment keys.
pub fn fingerprint(src: &str) -> String {
    format!("{:x}", md5::compute(src))
}

/// Shared session registry with TTL-driven lifecycle.
pub struct StreamRegistry {
    config: GatewayConfig,
    /// TTL map; every handler access rewrites the entry to slide expiration.
    sessions: Cache<String, Arc<StreamSession>>,
    /// Serializes lookup-then-insert so concurrent viewers of a new source
    /// materialize exactly one session.
    create: Mutex<()>,
}

impl StreamRegistry {
    pub fn new(config: GatewayConfig) -> Arc<Self> {
        let sessions = Cache::builder()
            .time_to_live(config.registry_ttl)
            .build();

        Arc::new(Self {
            config,
            sessions,
            create: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Session for `src`, creating it if absent. Refreshes the TTL either way.
    pub fn get_or_create(&self, src: &str) -> Arc<StreamSession> {
        let fp = fingerprint(src);

        let _guard = self.create.lock();
        let session = match self.sessions.get(&fp) {
            Some(session) => session,
            None => {
                info!(src, fingerprint = %fp, "registering new stream session");
                StreamSession::new(src, fp.clone(), self.config.clone())
            }
        };
        self.sessions.insert(fp, Arc::clone(&session));
        session
    }

    /// Session by fingerprint. Refreshes the TTL on hit; no side effects on
    /// miss.
    pub fn lookup(&self, fp: &str) -> Option<Arc<StreamSession>> {
        let session = self.sessions.get(fp)?;
        self.sessions.insert(fp.to_string(), Arc::clone(&session));
        Some(session)
    }

    /// Membership probe without TTL refresh; this is what producer loops
    /// poll for shutdown.
    pub fn contains(&self, fp: &str) -> bool {
        self.sessions.contains_key(fp)
    }

    /// Idempotent removal.
    pub fn evict(&self, fp: &str) {
        self.sessions.invalidate(fp);
    }

    /// Run the cache's deferred maintenance (expired-entry sweep).
    pub fn sweep(&self) {
        self.sessions.run_pending_tasks();
    }

    /// Playlist for `src`: dedups the session, starts its producer on first
    /// call, and blocks until the first segment is published.
    pub async fn playlist_for(self: Arc<Self>, src: &str) -> String {
        let session = self.get_or_create(src);
        session.playlist(self).await
    }

    /// Segment bytes by fingerprint and sequence, if the session and the
    /// segment are both still live.
    pub fn segment(&self, fp: &str, sequence: &str) -> Option<Bytes> {
        self.lookup(fp)?.segment(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fingerprint_is_deterministic_and_distinct() {
        let a = fingerprint("http://example.org/a.ts");
        let b = fingerprint("http://example.org/a.ts");
        let c = fingerprint("http://example.org/b.ts");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
    }

    #[test]
    fn test_get_or_create_dedups() {
        let registry = StreamRegistry::new(GatewayConfig::default());
        let a = registry.get_or_create("http://example.org/live.ts");
        let b = registry.get_or_create("http://example.org/live.ts");
        assert!(Arc::ptr_eq(&a, &b));

        let c = registry.get_or_create("http://example.org/other.ts");
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_lookup_and_evict() {
        let registry = StreamRegistry::new(GatewayConfig::default());
        let session = registry.get_or_create("http://example.org/live.ts");
        let fp = session.fingerprint().to_string();

        assert!(registry.contains(&fp));
        assert!(registry.lookup(&fp).is_some());

        registry.evict(&fp);
        assert!(!registry.contains(&fp));
        assert!(registry.lookup(&fp).is_none());

        // eviction is idempotent
        registry.evict(&fp);
    }

    #[test]
    fn test_close_is_idempotent_and_evicts() {
        let registry = StreamRegistry::new(GatewayConfig::default());
        let session = registry.get_or_create("http://example.org/live.ts");
        let fp = session.fingerprint().to_string();

        session.close(&registry);
        assert!(!registry.contains(&fp));
        session.close(&registry);
        assert!(!registry.contains(&fp));
    }

    #[test]
    fn test_ttl_expiry_and_resurrection() {
        let config = GatewayConfig {
            registry_ttl: Duration::from_millis(50),
            ..GatewayConfig::default()
        };
        let registry = StreamRegistry::new(config);

        let first = registry.get_or_create("http://example.org/live.ts");
        let fp = first.fingerprint().to_string();
        assert!(registry.contains(&fp));

        std::thread::sleep(Duration::from_millis(80));
        registry.sweep();
        assert!(!registry.contains(&fp));

        // a fresh request builds a new session under the same fingerprint
        let second = registry.get_or_create("http://example.org/live.ts");
        assert_eq!(second.fingerprint(), fp);
        assert!(!Arc::ptr_eq(&first, &second));
    }
}

//! Stream sessions.
//!
//! A session owns everything for one live transmux: the producer thread, the
//! sliding playlist, and the TTL-bounded segment store. Sessions are shared
//! by reference between the registry and HTTP handlers.

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::fetch::HttpSource;
use crate::playlist::SlidingPlaylist;
use crate::registry::StreamRegistry;
use crate::segmenter::Segmenter;

use bytes::Bytes;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// All state for one upstream source.
pub struct StreamSession {
    src: String,
    fingerprint: String,
    config: GatewayConfig,
    playlist: Mutex<SlidingPlaylist>,
    /// Segment key -> raw TS bytes, entries expiring on the segment TTL.
    segments: Cache<String, Bytes>,
    /// Idempotent producer-start latch.
    start: Once,
    /// One-shot "first segment ready" signal. Transitions false -> true
    /// exactly once, on first publication or on producer exit.
    first_tx: watch::Sender<bool>,
    closed: AtomicBool,
}

impl StreamSession {
    pub fn new(src: &str, fingerprint: String, config: GatewayConfig) -> Arc<Self> {
        let segments = Cache::builder()
            .time_to_live(config.segment_ttl)
            .build();
        let playlist = SlidingPlaylist::new(config.playlist_window, config.playlist_capacity);
        let (first_tx, _) = watch::channel(false);

        Arc::new(Self {
            src: src.to_string(),
            fingerprint,
            config,
            playlist: Mutex::new(playlist),
            segments,
            start: Once::new(),
            first_tx,
            closed: AtomicBool::new(false),
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// Canonical store key for a sequence number. The same form is used on
    /// insert and lookup.
    fn segment_key(&self, sequence: impl Display) -> String {
        format!("/{}/{}/live.ts", self.fingerprint, sequence)
    }

    /// Current playlist, starting the producer on first call and waiting
    /// until it has published at least one segment (or given up).
    pub async fn playlist(self: Arc<Self>, registry: Arc<StreamRegistry>) -> String {
        self.start.call_once(|| {
            let session = Arc::clone(&self);
            let registry = Arc::clone(&registry);
            let name = format!("tsgate-producer-{:.8}", self.fingerprint);
            let spawned = std::thread::Builder::new()
                .name(name)
                .spawn(move || session.run_producer(registry));
            if let Err(e) = spawned {
                error!(src = %self.src, error = %e, "failed to spawn producer");
                self.first_tx.send_replace(true);
            }
        });

        let mut first_rx = self.first_tx.subscribe();
        while !*first_rx.borrow_and_update() {
            if first_rx.changed().await.is_err() {
                break;
            }
        }

        self.playlist.lock().encode()
    }

    /// Fetch a stored segment by its sequence string.
    pub fn segment(&self, sequence: &str) -> Option<Bytes> {
        self.segments.get(&self.segment_key(sequence))
    }

    /// Tear the session down: evict from the registry and mark closed so the
    /// producer exits on its next iteration. Idempotent.
    pub fn close(&self, registry: &StreamRegistry) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            registry.evict(&self.fingerprint);
            info!(src = %self.src, "session closed");
        }
    }

    /// Producer thread body. Panics are contained here and downgraded to
    /// session closure; the first-ready signal always fires on the way out
    /// so no playlist waiter is left hanging.
    fn run_producer(self: Arc<Self>, registry: Arc<StreamRegistry>) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.produce(&registry)));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(src = %self.src, error = %e, "producer terminated"),
            Err(_) => error!(src = %self.src, "producer panicked"),
        }

        self.close(&registry);
        self.first_tx.send_replace(true);
    }

    fn produce(&self, registry: &StreamRegistry) -> Result<()> {
        info!(src = %self.src, fingerprint = %self.fingerprint, "starting transmux producer");

        let source = HttpSource::connect(&self.src)?;
        let mut segmenter = Segmenter::new(source, self.config.segment_interval);
        let mut sequence: u64 = 0;

        loop {
            // registry expiry is the only shutdown signal; a pure read here
            // so an abandoned stream cannot keep itself alive
            if self.closed.load(Ordering::SeqCst) || !registry.contains(&self.fingerprint) {
                info!(src = %self.src, "session expired, stopping producer");
                return Ok(());
            }

            let data = segmenter.next_segment()?;
            let key = self.segment_key(sequence);

            // insert before slide: a published playlist entry always
            // resolves in the store
            self.segments.insert(key.clone(), data);
            self.playlist
                .lock()
                .slide(key, self.config.segment_interval.as_secs_f64());

            sequence += 1;
            if sequence == 1 {
                self.first_tx.send_replace(true);
            }
        }
    }
}

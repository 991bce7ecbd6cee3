//! # tsgate-hls
//!
//! The core of the tsgate gateway: the transmuxing pipeline and the stream
//! registry.
//!
//! Data flow: upstream bytes -> [`Segmenter`] (TS reader + writer, with the
//! [`AudioRewriter`] engaged when the source carries MPEG-1 audio) ->
//! finished segment -> [`StreamSession`] (segment store + sliding playlist).
//!
//! Control flow: HTTP playlist request -> [`StreamRegistry`] -> session; the
//! first playlist read starts the session's producer loop, and registry TTL
//! expiry is what eventually stops it.

pub mod config;
pub mod error;
pub mod fetch;
pub mod playlist;
pub mod registry;
pub mod rewrite;
pub mod segmenter;
pub mod session;

pub use config::GatewayConfig;
pub use error::{HlsError, Result};
pub use fetch::HttpSource;
pub use playlist::SlidingPlaylist;
pub use registry::{fingerprint, StreamRegistry};
pub use rewrite::AudioRewriter;
pub use segmenter::Segmenter;
pub use session::StreamSession;

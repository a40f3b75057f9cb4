//! Caching gateway in front of the generative models used for construction
//! estimates: quote analysis with a TTL result cache, deadline-bounded
//! image/text generation, and polling of long-running video jobs.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod poller;
pub mod prompts;
pub mod rate_limit;
pub mod state;
pub mod stats;

pub use cache::ResultCache;
pub use client::{GeminiClient, GeminiConfig, GenerativeModel, VideoModel};
pub use error::{ErrorKind, GenerationError, GenerationResult, UpstreamError};
pub use fingerprint::fingerprint;
pub use gateway::{Gateway, GatewayConfig};
pub use poller::{BackoffPolicy, JobPoller, VideoArtifact};
pub use stats::{StatsRecorder, UsageStats};

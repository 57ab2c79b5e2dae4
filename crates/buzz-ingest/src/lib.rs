//! Network side of the attention score engine.
//!
//! A [`ProtocolClient`] owns one [`SessionManager`] and one [`RateLimiter`] and
//! speaks the two-step explore / widget-data protocol. The
//! [`AttentionScoreService`] wraps it with caching and fallback, and the
//! [`UpdateScheduler`] drives periodic batch refreshes through a
//! [`buzz_core::TargetRepository`].

pub mod config;
pub mod error;
pub mod protocol;
pub mod rate_limit;
pub mod scheduler;
pub mod service;
pub mod session;

pub use config::{CONFIG_FILE_NAME, Endpoints, IngestConfig, UPSTREAM_URL_ENV};
pub use error::{ConfigError, FailureKind, FetchError};
pub use protocol::{ProtocolClient, RegionScore, Widget, WidgetSet};
pub use rate_limit::RateLimiter;
pub use scheduler::UpdateScheduler;
pub use service::{AttentionScoreService, BatchReport, ServiceStatus, SharedCache, Stage};
pub use session::{Session, SessionManager};

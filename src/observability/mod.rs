//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server pipeline and client links produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the HTTP layer into procedure contexts
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

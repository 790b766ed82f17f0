//! Procedure routing subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded call (path, kind, raw input)
//!     → router.rs (exact path lookup, kind check)
//!     → procedure.rs (validator + callback, type-erased)
//!     → executor (validate, run, wrap in envelope)
//!
//! Router Compilation (at startup):
//!     RouterBuilder.query/mutation/nest
//!     → reject duplicate or malformed paths
//!     → Freeze as immutable Router owning the server state
//! ```
//!
//! # Design Decisions
//! - Procedures registered at startup, immutable at runtime
//! - Deterministic: same path and kind always resolve the same way
//! - Explicit NOT_FOUND rather than a silent default

pub mod procedure;
pub mod router;

pub use procedure::{CallFailure, Context, Procedure};
pub use router::{Router, RouterBuilder, RouterError};

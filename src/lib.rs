//! Schema-validated RPC over HTTP with per-call JSON or multipart encoding.

// Wire model
pub mod error;
pub mod input;
pub mod protocol;

// Server pipeline
pub mod content_type;
pub mod executor;
pub mod http;
pub mod routing;
pub mod validation;

// Client pipeline
pub mod client;
pub mod links;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

// Sample application
pub mod app;
pub mod store;

pub use client::{CallInput, Client, ClientError, FormPayload, Operation};
pub use config::RpcConfig;
pub use error::{ErrorCode, RpcError, ValidationError};
pub use http::RpcServer;
pub use lifecycle::Shutdown;
pub use protocol::{ProcedureKind, ResultEnvelope};
pub use routing::{Router, RouterBuilder};

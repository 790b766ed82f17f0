//! Client link chain.
//!
//! # Responsibilities
//! - Compose client middleware into one call executor
//! - Hand each operation to exactly one terminal link
//!
//! # Data Flow
//! ```text
//! Chain::execute(operation)
//!     → Next { links: [logger, retry, split] }.run
//!     → logger.call(op, next) → retry.call(op, next) → split.call(op, _)
//!     → split picks one sub-chain by predicate
//!         → form_data (multipart POST)
//!         → http / http_batch (JSON GET or POST)
//! ```
//!
//! # Design Decisions
//! - Links are an explicit slice walked by a `Next` cursor, not nested closures
//! - Composition is fixed when the chain is built
//! - A terminal link never calls `next`; an exhausted chain is `NoTerminalLink`

pub mod batch;
pub mod form_data;
pub mod http;
pub mod logger;
pub mod retry;
pub mod split;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::client::{ClientError, HttpTransport, Operation};
use crate::config::{ClientConfig, RetryConfig};

pub use batch::HttpBatchLink;
pub use form_data::FormDataLink;
pub use http::HttpLink;
pub use logger::LoggerLink;
pub use retry::RetryLink;
pub use split::{is_form_payload, SplitLink};

/// A unit of client middleware.
#[async_trait]
pub trait Link: Send + Sync {
    /// Answer the operation, or delegate to `next`.
    async fn call(&self, operation: Operation, next: Next<'_>) -> Result<Value, ClientError>;
}

/// Cursor over the links that follow the current one.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    links: &'a [Arc<dyn Link>],
}

impl<'a> Next<'a> {
    pub fn new(links: &'a [Arc<dyn Link>]) -> Self {
        Self { links }
    }

    /// Links still ahead of this cursor.
    pub fn remaining(&self) -> usize {
        self.links.len()
    }

    pub async fn run(self, operation: Operation) -> Result<Value, ClientError> {
        match self.links.split_first() {
            Some((link, rest)) => link.call(operation, Next { links: rest }).await,
            None => Err(ClientError::NoTerminalLink),
        }
    }
}

/// Ordered, immutable list of links.
#[derive(Clone)]
pub struct Chain {
    links: Arc<[Arc<dyn Link>]>,
}

impl Chain {
    pub fn new(links: Vec<Arc<dyn Link>>) -> Self {
        Self {
            links: links.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub async fn execute(&self, operation: Operation) -> Result<Value, ClientError> {
        Next::new(&self.links).run(operation).await
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("links", &self.links.len()).finish()
    }
}

/// Logger, optional retry, then a split between multipart and JSON links.
pub fn default_chain(
    config: &ClientConfig,
    retries: &RetryConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<Chain, ClientError> {
    let base = Url::parse(&config.url)
        .map_err(|e| ClientError::Transport(format!("Invalid base URL \"{}\": {}", config.url, e)))?;

    let json: Arc<dyn Link> = if config.batching {
        Arc::new(
            HttpBatchLink::new(
                base.clone(),
                transport.clone(),
                Duration::from_millis(config.batch_window_ms),
                config.max_batch_size,
            )
            .get_for_queries(config.get_for_queries),
        )
    } else {
        Arc::new(HttpLink::new(base.clone(), transport.clone()).get_for_queries(config.get_for_queries))
    };
    let form: Arc<dyn Link> = Arc::new(FormDataLink::new(base, transport));

    let mut links: Vec<Arc<dyn Link>> = vec![Arc::new(LoggerLink)];
    if retries.enabled {
        links.push(Arc::new(RetryLink::new(retries.clone())));
    }
    links.push(Arc::new(SplitLink::new(
        is_form_payload,
        Chain::new(vec![form]),
        Chain::new(vec![json]),
    )));
    Ok(Chain::new(links))
}

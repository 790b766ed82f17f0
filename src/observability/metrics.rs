//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpc_calls_total` (counter): calls by path, kind, outcome code
//! - `rpc_call_duration_seconds` (histogram): executor latency by path, kind
//! - `rpc_decode_failures_total` (counter): rejected bodies by handler
//! - `rpc_unsupported_media_type_total` (counter): unclaimed requests
//! - `rpc_client_dispatch_total` (counter): client calls by terminal link
//!
//! Recording is a no-op until a recorder is installed. Calls that never
//! resolve to a procedure are labelled [`UNRESOLVED_PATH`], so client-chosen
//! paths cannot create new series.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ErrorCode;
use crate::protocol::ProcedureKind;

/// `path` label for calls that did not resolve to a registered procedure.
pub const UNRESOLVED_PATH: &str = "unknown";

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one executed (or rejected) call.
pub fn record_call(path: &str, kind: ProcedureKind, code: Option<ErrorCode>, start: Option<Instant>) {
    let outcome = code.map(ErrorCode::as_str).unwrap_or("OK");
    counter!(
        "rpc_calls_total",
        "path" => path.to_string(),
        "kind" => kind.as_str(),
        "code" => outcome
    )
    .increment(1);

    if let Some(start) = start {
        histogram!(
            "rpc_call_duration_seconds",
            "path" => path.to_string(),
            "kind" => kind.as_str()
        )
        .record(start.elapsed().as_secs_f64());
    }
}

pub fn record_decode_failure(handler: &'static str) {
    counter!("rpc_decode_failures_total", "handler" => handler).increment(1);
}

pub fn record_unsupported_media_type() {
    counter!("rpc_unsupported_media_type_total").increment(1);
}

pub fn record_client_dispatch(link: &'static str) {
    counter!("rpc_client_dispatch_total", "link" => link).increment(1);
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all RPC handler
//! - Wire up middleware (tracing, limits, request ID)
//! - Decode each request through the content-type chain
//! - Execute decoded calls and encode their envelopes
//! - Serve until the shutdown signal fires
//!
//! # Design Decisions
//! - Procedure paths are the whole URL path, so one wildcard route serves all
//! - Batched calls run concurrently; one failing call never fails its siblings
//! - The body limit layer also bounds multipart extraction
//! - The request timeout is enforced inside the handler so an expired
//!   request still answers with a `TIMEOUT` envelope

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::Request,
    response::Response,
    routing::any,
};
use futures_util::future::join_all;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{RpcConfig, ServerConfig};
use crate::content_type::{
    ContentTypeChain, ContentTypeHandler, FormDataContentTypeHandler, JsonContentTypeHandler,
};
use crate::error::RpcError;
use crate::executor;
use crate::http::{request, response};
use crate::routing::Router;

/// Application state injected into the handler.
struct AppState<S> {
    router: Arc<Router<S>>,
    content_types: ContentTypeChain,
    request_timeout: Duration,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            content_types: self.content_types.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

/// HTTP server exposing a procedure router.
pub struct RpcServer<S> {
    router: Arc<Router<S>>,
    content_types: ContentTypeChain,
    config: ServerConfig,
}

impl<S: Send + Sync + 'static> RpcServer<S> {
    /// Create a server with the stock JSON and form-data handlers, JSON first.
    pub fn new(router: Router<S>, config: &RpcConfig) -> Self {
        let handlers: Vec<Arc<dyn ContentTypeHandler>> = vec![
            Arc::new(JsonContentTypeHandler::new(config.server.max_body_size)),
            Arc::new(FormDataContentTypeHandler::from_config(&config.uploads)),
        ];
        Self {
            router: Arc::new(router),
            content_types: ContentTypeChain::new(handlers),
            config: config.server.clone(),
        }
    }

    /// Replace the content-type chain.
    pub fn with_content_types(mut self, content_types: ContentTypeChain) -> Self {
        self.content_types = content_types;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    pub fn into_router(self) -> axum::Router {
        let state = AppState {
            router: self.router,
            content_types: self.content_types,
            request_timeout: Duration::from_secs(self.config.request_timeout_secs),
        };

        axum::Router::new()
            .route("/{*path}", any(rpc_handler::<S>))
            .route("/", any(rpc_handler::<S>))
            .with_state(state)
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .layer(GlobalConcurrencyLimitLayer::new(self.config.max_connections))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            procedures = self.router.len(),
            "HTTP server starting"
        );

        let app = self.into_router();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Decode, execute, encode, within the request timeout.
async fn rpc_handler<S: Send + Sync + 'static>(
    State(state): State<AppState<S>>,
    request: Request<Body>,
) -> Response {
    let request_id = request::request_id(request.headers());
    let path = request.uri().path().to_string();
    let limit = state.request_timeout;

    match tokio::time::timeout(limit, handle(state, request, request_id.clone())).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                request_id = request_id.as_deref().unwrap_or("unknown"),
                path = %path,
                timeout_secs = limit.as_secs(),
                "Request timed out"
            );
            response::failure(RpcError::timeout(format!(
                "Request did not complete within {}s",
                limit.as_secs()
            )))
        }
    }
}

async fn handle<S: Send + Sync + 'static>(
    state: AppState<S>,
    request: Request<Body>,
    request_id: Option<String>,
) -> Response {
    tracing::debug!(
        request_id = request_id.as_deref().unwrap_or("unknown"),
        method = %request.method(),
        path = %request.uri().path(),
        "Handling RPC request"
    );

    let decoded = match state.content_types.decode(request).await {
        Ok(decoded) => decoded,
        Err(err) => return response::failure(err),
    };

    let kind = decoded.kind;
    let router: &Router<S> = &state.router;
    if decoded.batch {
        let envelopes = join_all(
            decoded
                .calls
                .into_iter()
                .map(|call| executor::execute(router, kind, call, request_id.clone())),
        )
        .await;
        return response::batch(envelopes);
    }

    match decoded.calls.into_iter().next() {
        Some(call) => response::single(executor::execute(router, kind, call, request_id).await),
        None => response::failure(RpcError::bad_request("Request contained no calls")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{FormSchema, Passthrough};
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn server() -> axum::Router {
        server_with(&RpcConfig::default())
    }

    fn server_with(config: &RpcConfig) -> axum::Router {
        let router = Router::<()>::builder()
            .query("echo", Passthrough, |_ctx, input| async move {
                match input {
                    crate::input::RawInput::Json(v) => Ok(v),
                    crate::input::RawInput::Form(_) => Err(RpcError::bad_request("json only")),
                }
            })
            .mutation("greet", FormSchema::new().text("name"), |_ctx, form| async move {
                Ok::<_, RpcError>(json!({ "hello": form.text("name").unwrap_or_default() }))
            })
            .query("slow", Passthrough, |_ctx, _input| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, RpcError>(Value::Null)
            })
            .build(())
            .unwrap();
        RpcServer::new(router, config).into_router()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_json_query_over_post() {
        let response = server()
            .oneshot(
                Request::post("/echo")
                    .header("content-type", "application/json")
                    .header("x-rpc-kind", "query")
                    .body(Body::from(r#"{"input":{"a":1}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_json(response).await, json!({"ok": true, "data": {"a": 1}}));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let response = server()
            .oneshot(
                Request::post("/echo,missing?batch=1")
                    .header("content-type", "application/json")
                    .header("x-rpc-kind", "query")
                    .body(Body::from(r#"[{"input":1},{"input":2}]"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::MULTI_STATUS);
        let body = body_json(response).await;
        assert_eq!(body[0], json!({"ok": true, "data": 1}));
        assert_eq!(body[1]["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unclaimed_content_type() {
        let response = server()
            .oneshot(
                Request::post("/greet")
                    .header("content-type", "text/plain")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body_json(response).await["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_not_found() {
        let response = server()
            .oneshot(Request::get("/greet").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_answers_with_envelope() {
        let mut config = RpcConfig::default();
        config.server.request_timeout_secs = 1;

        let response = server_with(&config)
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "TIMEOUT");
    }
}

//! JSON terminal link, one exchange per call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use super::{Link, Next};
use crate::client::transport::Method;
use crate::client::{CallInput, ClientError, HttpRequest, HttpTransport, Operation, RequestBody};
use crate::observability::metrics;
use crate::protocol::{ProcedureKind, BATCH_PARAM, INPUT_PARAM, KIND_HEADER};

pub struct HttpLink {
    base: Url,
    transport: Arc<dyn HttpTransport>,
    get_for_queries: bool,
}

impl HttpLink {
    pub fn new(base: Url, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base,
            transport,
            get_for_queries: true,
        }
    }

    /// Send queries as GET (default) or POST.
    pub fn get_for_queries(mut self, enabled: bool) -> Self {
        self.get_for_queries = enabled;
        self
    }
}

#[async_trait]
impl Link for HttpLink {
    async fn call(&self, operation: Operation, _next: Next<'_>) -> Result<Value, ClientError> {
        let input = json_input(operation.input, "http")?;
        metrics::record_client_dispatch("http");

        let request = json_request(
            &self.base,
            &operation.path,
            operation.kind,
            json!({ "input": input }),
            false,
            self.get_for_queries,
        );
        self.transport.send(request).await?.into_result()
    }
}

pub(crate) fn json_input(input: CallInput, link: &str) -> Result<Value, ClientError> {
    match input {
        CallInput::Json(value) => Ok(value),
        CallInput::Form(_) => Err(ClientError::Protocol(format!(
            "The {} link cannot encode form input",
            link
        ))),
    }
}

/// `base` with `paths` appended to its path.
pub(crate) fn procedure_url(base: &Url, paths: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}/{}", prefix, paths));
    url
}

/// GET with the body in the `input` parameter for queries, POST otherwise.
pub(crate) fn json_request(
    base: &Url,
    paths: &str,
    kind: ProcedureKind,
    body: Value,
    batch: bool,
    get_for_queries: bool,
) -> HttpRequest {
    let mut url = procedure_url(base, paths);
    if batch {
        url.query_pairs_mut().append_pair(BATCH_PARAM, "1");
    }

    if kind == ProcedureKind::Query && get_for_queries {
        url.query_pairs_mut().append_pair(INPUT_PARAM, &body.to_string());
        HttpRequest::new(Method::GET, url, RequestBody::Empty)
    } else {
        HttpRequest::new(Method::POST, url, RequestBody::Json(body)).header(KIND_HEADER, kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::links::testing::{base, envelope, MockTransport};
    use crate::links::Chain;

    fn op(kind: ProcedureKind, input: Value) -> Operation {
        Operation {
            id: 1,
            path: "users.get".into(),
            kind,
            input: input.into(),
        }
    }

    fn chain(link: HttpLink) -> Chain {
        let links: Vec<Arc<dyn Link>> = vec![Arc::new(link)];
        Chain::new(links)
    }

    #[test]
    fn test_procedure_url_keeps_prefix() {
        assert_eq!(procedure_url(&base(), "a,b").as_str(), "http://rpc.test/api/a,b");

        let root = Url::parse("http://rpc.test").unwrap();
        assert_eq!(procedure_url(&root, "users.get").as_str(), "http://rpc.test/users.get");
    }

    #[tokio::test]
    async fn test_query_as_get() {
        let transport = MockTransport::answering(json!({"name": "bob"}));
        let data = chain(HttpLink::new(base(), transport.clone()))
            .execute(op(ProcedureKind::Query, json!({"name": "bob"})))
            .await
            .unwrap();
        assert_eq!(data, json!({"name": "bob"}));

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.body, RequestBody::Empty);
        let (key, value) = request.url.query_pairs().next().unwrap();
        assert_eq!(key, INPUT_PARAM);
        assert_eq!(
            serde_json::from_str::<Value>(&value).unwrap(),
            json!({"input": {"name": "bob"}})
        );
    }

    #[tokio::test]
    async fn test_mutation_as_post() {
        let transport = MockTransport::answering(Value::Null);
        chain(HttpLink::new(base(), transport.clone()).get_for_queries(false))
            .execute(op(ProcedureKind::Mutation, json!(5)))
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.kind_header(), Some("mutation"));
        assert_eq!(request.body, RequestBody::Json(json!({"input": 5})));
    }

    #[tokio::test]
    async fn test_failure_envelope_is_rpc_error() {
        let transport = MockTransport::new(|_| {
            Ok(envelope(
                404,
                json!({"ok": false, "error": {"code": "NOT_FOUND", "message": "User not found"}}),
            ))
        });
        let err = chain(HttpLink::new(base(), transport))
            .execute(op(ProcedureKind::Query, json!({"name": "unknown"})))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_rejects_form_input() {
        let transport = MockTransport::answering(Value::Null);
        let mut operation = op(ProcedureKind::Mutation, Value::Null);
        operation.input = crate::client::FormPayload::new().into();

        let err = chain(HttpLink::new(base(), transport.clone()))
            .execute(operation)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
        assert!(transport.requests().is_empty());
    }
}

//! Batching JSON terminal link.
//!
//! # Responsibilities
//! - Hold JSON calls for a short window and send them as one exchange
//! - Keep one queue per procedure kind, since a request carries one kind
//! - Demultiplex the batch response back to each caller by index
//!
//! # Design Decisions
//! - A queue flushes when its window elapses or it reaches `max_batch_size`
//! - A queue holding a single call is sent as a plain, non-batch request
//! - A failed exchange fails every call in that batch, never other batches
//! - Calls whose caller has gone are left out when the queue flushes
//! - A lone call's exchange is aborted when its caller goes away; a shared
//!   batch still goes out for the remaining callers

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use url::Url;

use super::http::{json_input, json_request};
use super::{Link, Next};
use crate::client::{ClientError, HttpTransport, Operation};
use crate::observability::metrics;
use crate::protocol::ProcedureKind;

type Reply = oneshot::Sender<Result<Value, ClientError>>;

struct PendingCall {
    path: String,
    input: Value,
    reply: Reply,
}

#[derive(Default)]
struct Queue {
    calls: Vec<PendingCall>,
    /// Bumped on every flush so a stale window timer does nothing.
    generation: u64,
}

struct Batcher {
    base: Url,
    transport: Arc<dyn HttpTransport>,
    get_for_queries: bool,
    window: Duration,
    max_batch_size: usize,
    queues: Mutex<HashMap<ProcedureKind, Queue>>,
}

pub struct HttpBatchLink {
    batcher: Arc<Batcher>,
}

impl HttpBatchLink {
    pub fn new(
        base: Url,
        transport: Arc<dyn HttpTransport>,
        window: Duration,
        max_batch_size: usize,
    ) -> Self {
        Self {
            batcher: Arc::new(Batcher {
                base,
                transport,
                get_for_queries: true,
                window,
                max_batch_size: max_batch_size.max(1),
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Send query batches as GET (default) or POST.
    ///
    /// Must be called before the link is shared.
    pub fn get_for_queries(mut self, enabled: bool) -> Self {
        if let Some(batcher) = Arc::get_mut(&mut self.batcher) {
            batcher.get_for_queries = enabled;
        }
        self
    }
}

#[async_trait]
impl Link for HttpBatchLink {
    async fn call(&self, operation: Operation, _next: Next<'_>) -> Result<Value, ClientError> {
        let input = json_input(operation.input, "http_batch")?;
        let (reply, receiver) = oneshot::channel();
        self.batcher.enqueue(
            operation.kind,
            PendingCall {
                path: operation.path,
                input,
                reply,
            },
        );
        receiver
            .await
            .map_err(|_| ClientError::Transport("Batch was dropped before it completed".to_string()))?
    }
}

impl Batcher {
    fn lock(&self) -> MutexGuard<'_, HashMap<ProcedureKind, Queue>> {
        self.queues.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enqueue(self: &Arc<Self>, kind: ProcedureKind, call: PendingCall) {
        let mut queues = self.lock();
        let queue = queues.entry(kind).or_default();
        queue.calls.push(call);

        if queue.calls.len() >= self.max_batch_size {
            let calls = std::mem::take(&mut queue.calls);
            queue.generation += 1;
            drop(queues);

            let batcher = self.clone();
            tokio::spawn(async move { batcher.dispatch(kind, calls).await });
        } else if queue.calls.len() == 1 {
            let generation = queue.generation;
            drop(queues);

            let batcher = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(batcher.window).await;
                if let Some(calls) = batcher.take(kind, generation) {
                    batcher.dispatch(kind, calls).await;
                }
            });
        }
    }

    /// Drain the queue if it has not been flushed since `generation`.
    fn take(&self, kind: ProcedureKind, generation: u64) -> Option<Vec<PendingCall>> {
        let mut queues = self.lock();
        let queue = queues.get_mut(&kind)?;
        if queue.generation != generation || queue.calls.is_empty() {
            return None;
        }
        queue.generation += 1;
        Some(std::mem::take(&mut queue.calls))
    }

    async fn dispatch(&self, kind: ProcedureKind, mut calls: Vec<PendingCall>) {
        calls.retain(|call| !call.reply.is_closed());
        if calls.is_empty() {
            tracing::debug!(kind = %kind, "Every queued caller went away; nothing to send");
            return;
        }

        metrics::record_client_dispatch("http_batch");
        tracing::debug!(kind = %kind, calls = calls.len(), "Dispatching batch");

        if calls.len() == 1 {
            for call in calls {
                self.dispatch_one(kind, call).await;
            }
            return;
        }

        let paths = calls
            .iter()
            .map(|c| c.path.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let (inputs, replies): (Vec<Value>, Vec<Reply>) = calls
            .into_iter()
            .map(|c| (json!({ "input": c.input }), c.reply))
            .unzip();

        let request = json_request(
            &self.base,
            &paths,
            kind,
            Value::Array(inputs),
            true,
            self.get_for_queries,
        );
        let results = match self.transport.send(request).await {
            Ok(response) => response.into_batch_results(replies.len()),
            Err(err) => {
                tracing::warn!(kind = %kind, calls = replies.len(), error = %err, "Batch exchange failed");
                vec![Err(err); replies.len()]
            }
        };

        for (reply, result) in replies.into_iter().zip(results) {
            let _ = reply.send(result);
        }
    }

    /// Send one call as a plain request, dropping the exchange if the caller leaves.
    async fn dispatch_one(&self, kind: ProcedureKind, mut call: PendingCall) {
        let request = json_request(
            &self.base,
            &call.path,
            kind,
            json!({ "input": call.input }),
            false,
            self.get_for_queries,
        );
        let result = tokio::select! {
            sent = self.transport.send(request) => sent.and_then(|response| response.into_result()),
            _ = call.reply.closed() => {
                tracing::debug!(path = %call.path, "Caller went away; abandoning request");
                return;
            }
        };
        let _ = call.reply.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::Method;
    use crate::client::{HttpRequest, HttpResponse, RequestBody};
    use std::sync::atomic::{AtomicBool, Ordering};
    use crate::error::ErrorCode;
    use crate::links::testing::{base, envelope, MockTransport};
    use crate::links::Chain;
    use crate::protocol::{BATCH_PARAM, KIND_HEADER};

    fn chain(transport: Arc<MockTransport>, window_ms: u64, max: usize) -> Chain {
        let link = HttpBatchLink::new(base(), transport, Duration::from_millis(window_ms), max)
            .get_for_queries(false);
        let links: Vec<Arc<dyn Link>> = vec![Arc::new(link)];
        Chain::new(links)
    }

    fn op(path: &str, kind: ProcedureKind, input: Value) -> Operation {
        Operation {
            id: 1,
            path: path.into(),
            kind,
            input: input.into(),
        }
    }

    /// Echoes each batched input back, failing calls whose input is `"fail"`.
    fn echo_transport() -> Arc<MockTransport> {
        MockTransport::new(|request| {
            let RequestBody::Json(body) = &request.body else {
                panic!("expected json body");
            };
            let answer = |input: &Value| {
                if input == "fail" {
                    json!({"ok": false, "error": {"code": "BAD_REQUEST", "message": "nope"}})
                } else {
                    json!({"ok": true, "data": input})
                }
            };
            Ok(match body {
                Value::Array(calls) => {
                    envelope(207, Value::Array(calls.iter().map(|c| answer(&c["input"])).collect()))
                }
                single => envelope(200, answer(&single["input"])),
            })
        })
    }

    #[tokio::test]
    async fn test_coalesces_calls_in_window() {
        let transport = echo_transport();
        let chain = chain(transport.clone(), 20, 10);

        let (a, b, c) = tokio::join!(
            chain.execute(op("a", ProcedureKind::Query, json!(1))),
            chain.execute(op("b", ProcedureKind::Query, json!("fail"))),
            chain.execute(op("c", ProcedureKind::Query, json!(3))),
        );
        assert_eq!(a.unwrap(), json!(1));
        assert_eq!(b.unwrap_err().code(), Some(ErrorCode::BadRequest));
        assert_eq!(c.unwrap(), json!(3));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].url.path(), "/api/a,b,c");
        assert!(requests[0].url.query_pairs().any(|(k, v)| k == BATCH_PARAM && v == "1"));
    }

    #[tokio::test]
    async fn test_splits_batches_by_kind() {
        let transport = echo_transport();
        let chain = chain(transport.clone(), 20, 10);

        let (q, m) = tokio::join!(
            chain.execute(op("q", ProcedureKind::Query, json!("q"))),
            chain.execute(op("m", ProcedureKind::Mutation, json!("m"))),
        );
        assert_eq!(q.unwrap(), json!("q"));
        assert_eq!(m.unwrap(), json!("m"));

        let mut kinds: Vec<_> = transport
            .requests()
            .iter()
            .map(|r| r.kind_header().unwrap_or_default().to_string())
            .collect();
        kinds.sort();
        assert_eq!(kinds, vec!["mutation", "query"]);
        assert!(transport.requests().iter().all(|r| r.headers.iter().any(|(k, _)| k == KIND_HEADER)));
    }

    #[tokio::test]
    async fn test_flushes_at_max_batch_size() {
        let transport = echo_transport();
        let chain = chain(transport.clone(), 20, 2);

        let (a, b, c) = tokio::join!(
            chain.execute(op("a", ProcedureKind::Query, json!(1))),
            chain.execute(op("b", ProcedureKind::Query, json!(2))),
            chain.execute(op("c", ProcedureKind::Query, json!(3))),
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (json!(1), json!(2), json!(3)));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_fails_whole_batch() {
        let transport = MockTransport::new(|_| Err(ClientError::Transport("refused".into())));
        let chain = chain(transport, 10, 10);

        let (a, b) = tokio::join!(
            chain.execute(op("a", ProcedureKind::Query, json!(1))),
            chain.execute(op("b", ProcedureKind::Query, json!(2))),
        );
        assert_eq!(a, Err(ClientError::Transport("refused".into())));
        assert_eq!(b, Err(ClientError::Transport("refused".into())));
    }

    /// Transport whose exchange never finishes; flags when it is dropped.
    struct Stalled {
        started: Arc<AtomicBool>,
        aborted: Arc<AtomicBool>,
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl HttpTransport for Stalled {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, ClientError> {
            let _guard = SetOnDrop(self.aborted.clone());
            self.started.store(true, Ordering::SeqCst);
            std::future::pending::<()>().await;
            Err(ClientError::Timeout)
        }
    }

    #[tokio::test]
    async fn test_caller_dropped_before_flush_sends_nothing() {
        let transport = echo_transport();
        let chain = chain(transport.clone(), 50, 10);

        let early = tokio::time::timeout(
            Duration::from_millis(5),
            chain.execute(op("a", ProcedureKind::Query, json!(1))),
        )
        .await;
        assert!(early.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_lone_call_exchange_aborted_with_caller() {
        let started = Arc::new(AtomicBool::new(false));
        let aborted = Arc::new(AtomicBool::new(false));
        let transport = Arc::new(Stalled {
            started: started.clone(),
            aborted: aborted.clone(),
        });
        let link = HttpBatchLink::new(base(), transport, Duration::from_millis(1), 10);
        let links: Vec<Arc<dyn Link>> = vec![Arc::new(link)];
        let chain = Chain::new(links);

        let call = tokio::spawn(async move { chain.execute(op("a", ProcedureKind::Query, json!(1))).await });
        while !started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(!aborted.load(Ordering::SeqCst));

        call.abort();
        for _ in 0..100 {
            if aborted.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(aborted.load(Ordering::SeqCst));
    }
}

use crate::client::state::{lock, BatchState, ClientState, InFlightGuard};
use crate::client::validation::validate_sub_request;
use crate::config::BatchOptions;
use crate::demux::demultiplex;
use crate::multipart::encode;
use crate::transport::{BatchTransport, HttpTransport, OuterRequest};
use crate::types::{BatchOutcome, SubRequest};
use crate::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const GENERATED_ID_PREFIX: &str = "Batchelor_";

/// Batches sub-requests into one multipart request and routes the results.
///
/// One batch may be in flight per client at a time; use separate clients for
/// concurrent batches.
pub struct Batchelor {
    options: BatchOptions,
    transport: Arc<dyn BatchTransport>,
    state: Mutex<BatchState>,
}

impl Batchelor {
    /// Create a client that talks HTTP through [`HttpTransport`].
    pub fn new(options: BatchOptions) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::with_transport(options, transport)
    }

    /// Create a client over any [`BatchTransport`].
    pub fn with_transport(options: BatchOptions, transport: Arc<dyn BatchTransport>) -> Result<Self> {
        Ok(Self {
            options: options.prepare()?,
            transport,
            state: Mutex::new(BatchState::default()),
        })
    }

    pub fn builder() -> crate::client::builder::BatchelorBuilder {
        crate::client::builder::BatchelorBuilder::new()
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn state(&self) -> ClientState {
        lock(&self.state).state()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the queue, in encoding order.
    pub fn requests(&self) -> Vec<SubRequest> {
        lock(&self.state).requests.clone()
    }

    /// Validate and queue one sub-request.
    ///
    /// A correlation id is generated when the request has none. Validation
    /// failures are returned immediately and leave the queue untouched.
    pub fn add(&self, mut request: SubRequest) -> Result<&Self> {
        let mut state = lock(&self.state);
        validate_sub_request(&request, &state.ids)?;
        if request.correlation_id.is_none() {
            request.correlation_id = Some(Self::generate_id(&state));
        }
        state.push(request);
        Ok(self)
    }

    /// Queue several sub-requests in order; same as calling [`add`](Self::add)
    /// for each. Stops at the first invalid request, keeping those before it.
    pub fn add_all<I>(&self, requests: I) -> Result<&Self>
    where
        I: IntoIterator<Item = SubRequest>,
    {
        for request in requests {
            self.add(request)?;
        }
        Ok(self)
    }

    /// Clear the queue, callbacks and extension data.
    pub fn reset(&self) -> &Self {
        lock(&self.state).clear();
        self
    }

    fn generate_id(state: &BatchState) -> String {
        loop {
            let id = format!("{}{}", GENERATED_ID_PREFIX, Uuid::new_v4().simple());
            if !state.ids.contains(&id) {
                return id;
            }
        }
    }

    /// Send the queued batch and demultiplex the response.
    ///
    /// The queue is left intact: running again without [`reset`](Self::reset)
    /// resends the same batch. Fails with [`Error::BatchInFlight`] while
    /// another `run` on this client is pending.
    pub async fn run(&self) -> Result<BatchOutcome> {
        let _guard = InFlightGuard::acquire(&self.state).ok_or(Error::BatchInFlight)?;

        let (requests, routes) = {
            let state = lock(&self.state);
            (state.requests.clone(), state.routes())
        };

        let parts = encode(&requests)?;
        let request = OuterRequest {
            uri: self.options.uri.clone(),
            method: self.options.method,
            headers: self.options.headers.clone(),
            parts,
            auth: self.options.auth.clone(),
            timeout: self.options.timeout_secs.map(Duration::from_secs),
        };

        info!(uri = %request.uri, parts = request.parts.len(), "dispatching batch");
        let response = self.transport.send(request).await?;

        if response.status != 200 {
            warn!(status = response.status, "batch request did not return 200 OK");
            return Err(Error::UnexpectedStatus {
                status: response.status,
            });
        }

        let content_type = response.content_type().to_string();
        let outcome = demultiplex(response.body, &content_type, &routes).await?;
        info!(
            aggregated = outcome.result.parts.len(),
            "batch complete"
        );
        Ok(outcome)
    }

    /// Callback flavour of [`run`](Self::run): `on_complete` is invoked
    /// exactly once, with the outcome or the error.
    pub async fn run_with<F>(&self, on_complete: F)
    where
        F: FnOnce(Result<BatchOutcome>),
    {
        on_complete(self.run().await)
    }
}

impl std::fmt::Debug for Batchelor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batchelor")
            .field("options", &self.options)
            .field("state", &self.state())
            .field("queued", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;
    use crate::types::Method;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use serde_json::json;
    use std::collections::BTreeMap;

    /// Replies with a canned response and records what was sent.
    struct CannedTransport {
        status: u16,
        content_type: String,
        body: String,
        delay: Option<Duration>,
        sent: Mutex<Vec<OuterRequest>>,
    }

    impl CannedTransport {
        fn new(status: u16, content_type: &str, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status,
                content_type: content_type.to_string(),
                body: body.to_string(),
                delay: None,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn delayed(mut self: Arc<Self>, delay: Duration) -> Arc<Self> {
            Arc::get_mut(&mut self).unwrap().delay = Some(delay);
            self
        }

        fn sent(&self) -> Vec<OuterRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchTransport for CannedTransport {
        async fn send(&self, request: OuterRequest) -> Result<TransportResponse> {
            self.sent.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut headers = BTreeMap::new();
            headers.insert("content-type".to_string(), self.content_type.clone());
            Ok(TransportResponse {
                status: self.status,
                headers,
                body: Box::pin(stream::iter(vec![Ok(Bytes::from(self.body.clone()))])),
            })
        }
    }

    const CT: &str = "multipart/mixed; boundary=batch_x";

    fn response(ids_and_bodies: &[(&str, &str)]) -> String {
        let mut out = String::new();
        for (id, body) in ids_and_bodies {
            out.push_str(&format!(
                "--batch_x\r\nContent-Type: application/http\r\nContent-ID: response-{}\r\n\r\nHTTP/1.1 200 OK\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{}\r\n",
                id, body
            ));
        }
        out.push_str("--batch_x--\r\n");
        out
    }

    fn client(transport: Arc<CannedTransport>) -> Batchelor {
        Batchelor::with_transport(
            BatchOptions::new("https://www.googleapis.com/batch/gmail/v1/"),
            transport,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_uri_fails_at_construction() {
        let err = Batchelor::with_transport(BatchOptions::new(""), CannedTransport::new(200, CT, ""))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_add_assigns_unique_ids() {
        let c = client(CannedTransport::new(200, CT, ""));
        c.add(SubRequest::get("/a")).unwrap().add(SubRequest::get("/b")).unwrap();
        let ids: Vec<String> = c.requests().iter().map(|r| r.correlation_id().to_string()).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert!(ids.iter().all(|id| id.starts_with(GENERATED_ID_PREFIX)));
        assert_eq!(c.state(), ClientState::Queuing);
    }

    #[test]
    fn test_add_keeps_supplied_id_and_rejects_invalid() {
        let c = client(CannedTransport::new(200, CT, ""));
        c.add(SubRequest::get("/a").with_correlation_id("mine")).unwrap();
        assert_eq!(c.requests()[0].correlation_id(), "mine");

        assert!(c.add(SubRequest::get("")).unwrap_err().is_validation());
        assert!(c.add(SubRequest::new(Method::Post, "/p")).unwrap_err().is_validation());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_add_all_matches_sequential_add() {
        let make = || {
            vec![
                SubRequest::get("/a").with_correlation_id("1"),
                SubRequest::post("/b", json!({"x": 1})).with_correlation_id("2"),
                SubRequest::get("/c").with_correlation_id("3"),
            ]
        };
        let bulk = client(CannedTransport::new(200, CT, ""));
        bulk.add_all(make()).unwrap();
        let single = client(CannedTransport::new(200, CT, ""));
        for r in make() {
            single.add(r).unwrap();
        }
        assert_eq!(
            encode(&bulk.requests()).unwrap(),
            encode(&single.requests()).unwrap()
        );
    }

    #[test]
    fn test_add_all_stops_at_first_invalid() {
        let c = client(CannedTransport::new(200, CT, ""));
        let err = c
            .add_all(vec![SubRequest::get("/ok"), SubRequest::get(""), SubRequest::get("/never")])
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(c.len(), 1);
    }

    #[tokio::test]
    async fn test_run_aggregates_without_callbacks() {
        let transport = CannedTransport::new(
            200,
            CT,
            &response(&[("a", r#"{"id":"1"}"#), ("b", r#"{"id":"2"}"#)]),
        );
        let c = client(transport.clone());
        c.add(SubRequest::get("/m/1").with_correlation_id("a")).unwrap();
        c.add(SubRequest::get("/m/2").with_correlation_id("b")).unwrap();

        let outcome = c.run().await.unwrap();
        let bodies: Vec<_> = outcome.result.parts.iter().map(|p| p.body.clone().unwrap()).collect();
        assert_eq!(bodies, vec![json!({"id": "1"}), json!({"id": "2"})]);
        assert_eq!(outcome.result.errors, 0);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].header("content-type"), Some("multipart/mixed;"));
        let ids: Vec<_> = sent[0].parts.iter().map(|p| p.content_id().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_run_routes_callbacks_with_extension_data() {
        let transport = CannedTransport::new(
            200,
            CT,
            &response(&[("lbl", r#"{"name":"Receipts"}"#), ("msg", r#"{"id":"9"}"#)]),
        );
        let c = client(transport);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        c.add(
            SubRequest::post("/labels", json!({"name": "Receipts"}))
                .with_correlation_id("lbl")
                .with_extension_data(json!({"row": 3}))
                .with_callback(move |part, ext| sink.lock().unwrap().push((part, ext))),
        )
        .unwrap();
        c.add(SubRequest::get("/messages/9").with_correlation_id("msg")).unwrap();

        let outcome = c.run().await.unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.correlation_id(), Some("lbl"));
        assert_eq!(seen[0].0.body, Some(json!({"name": "Receipts"})));
        assert_eq!(seen[0].1, Some(json!({"row": 3})));
        assert_eq!(outcome.result.parts.len(), 1);
        assert_eq!(outcome.result.parts[0].correlation_id(), Some("msg"));
        assert_eq!(outcome.extension_data.get("lbl"), Some(&json!({"row": 3})));
    }

    #[tokio::test]
    async fn test_bracketed_content_id_reaches_callback() {
        let body = "--batch_x\r\nContent-Type: application/http\r\nContent-ID: <response-item1>\r\n\r\nHTTP/1.1 200 OK\r\n\r\n{\"id\":\"1\"}\r\n--batch_x--\r\n";
        let c = client(CannedTransport::new(200, CT, body));
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        c.add(
            SubRequest::get("/a")
                .with_correlation_id("<item1>")
                .with_callback(move |_, _| *counter.lock().unwrap() += 1),
        )
        .unwrap();

        let outcome = c.run().await.unwrap();
        assert_eq!(*hits.lock().unwrap(), 1);
        assert!(outcome.result.parts.is_empty());
    }

    #[tokio::test]
    async fn test_non_200_short_circuits() {
        let transport = CannedTransport::new(503, CT, &response(&[("a", "{}")]));
        let c = client(transport);
        c.add(SubRequest::get("/a").with_correlation_id("a").with_callback(|_, _| panic!("no parts expected")))
            .unwrap();
        let err = c.run().await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus { status: 503 }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_missing_boundary_short_circuits() {
        let c = client(CannedTransport::new(200, "multipart/mixed", &response(&[("a", "{}")])));
        c.add(SubRequest::get("/a")).unwrap();
        assert!(matches!(c.run().await.unwrap_err(), Error::BoundaryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_run_does_not_clear_queue() {
        let transport = CannedTransport::new(200, CT, &response(&[]));
        let c = client(transport.clone());
        c.add(SubRequest::get("/a")).unwrap();
        c.run().await.unwrap();
        c.run().await.unwrap();
        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].parts, sent[1].parts);
        assert_eq!(c.state(), ClientState::Queuing);
    }

    #[tokio::test]
    async fn test_reset_sends_empty_batch() {
        let transport = CannedTransport::new(200, CT, &response(&[]));
        let c = client(transport.clone());
        c.add(SubRequest::get("/a").with_callback(|_, _| {})).unwrap();
        c.reset().reset();
        assert_eq!(c.state(), ClientState::Idle);
        let outcome = c.run().await.unwrap();
        assert!(outcome.result.parts.is_empty());
        assert!(outcome.extension_data.is_empty());
        assert!(transport.sent()[0].parts.is_empty());
    }

    #[tokio::test]
    async fn test_second_run_while_in_flight_is_rejected() {
        let transport = CannedTransport::new(200, CT, &response(&[])).delayed(Duration::from_millis(50));
        let c = client(transport.clone());
        c.add(SubRequest::get("/a")).unwrap();

        let (first, second) = tokio::join!(c.run(), c.run());
        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::BatchInFlight)));
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(c.state(), ClientState::Queuing);
    }

    #[tokio::test]
    async fn test_run_with_invokes_callback_once() {
        let c = client(CannedTransport::new(500, CT, ""));
        c.add(SubRequest::get("/a")).unwrap();
        let mut calls = 0;
        c.run_with(|result| {
            calls += 1;
            assert!(result.unwrap_err().is_transport());
        })
        .await;
        assert_eq!(calls, 1);
    }
}

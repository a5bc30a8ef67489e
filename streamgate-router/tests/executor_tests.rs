//! Executor tests: dispatch order, identity enrichment, failure handling and
//! the concurrency bound, all against in-memory seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use streamgate_core::types::{
    ChangeRecord, EventId, EventSource, Operation, TypeName, WorkflowInput,
};
use streamgate_router::{
    Action, DispatchError, DispatchRequest, Dispatcher, IdentityLookup, LookupError,
    LookupOutcome, LookupResponse, RecordOutcome, RecordingDispatcher, Router, RouterContext,
    RouterError, StaticLookup,
};

const SELF: &str = "orders";
const TIMEOUT: Duration = Duration::from_millis(500);

fn ctx() -> RouterContext {
    RouterContext::new(SELF)
}

fn record(id: &str, typename: &str, after: Value) -> ChangeRecord {
    ChangeRecord {
        after: Some(after.as_object().cloned().expect("object")),
        before: None,
        event_id: EventId::from(id),
        timestamp: Utc::now(),
        operation: Operation::Create,
        event_source: EventSource::Dynamodb,
        entity_type: Some(TypeName::from(typename)),
        changed: true,
    }
}

fn file_created(id: &str, object: Value) -> ChangeRecord {
    record(
        id,
        "Event",
        json!({"medium": "S3", "source": SELF, "type": "s3File.created", "data": {"object": object}}),
    )
}

fn router<D, L>(dispatcher: D, lookup: L) -> Arc<Router<D, L>>
where
    D: Dispatcher + 'static,
    L: IdentityLookup + 'static,
{
    Arc::new(Router::new(dispatcher, lookup, ctx(), 20, TIMEOUT))
}

// ---------------------------------------------------------------------------
// Identity enrichment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_create_without_identity_skips_lookup() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let lookup = Arc::new(StaticLookup::new());
    let r = router(dispatcher.clone(), lookup.clone());

    let rec = file_created("e1", json!({"bucketName": "b", "filePath": "p", "size": 10}));
    let report = r.route_record(0, &rec).await;

    assert!(lookup.reads().is_empty(), "no lookup without identity");
    assert_eq!(
        dispatcher.sent(),
        vec![DispatchRequest::new(
            Action::FileCreate,
            json!({"bucketName": "b", "filePath": "p", "size": 10})
        )]
    );
    assert!(matches!(report.outcome, RecordOutcome::Routed { lookup: None, .. }));
}

#[tokio::test]
async fn resolved_identity_adds_user_id() {
    let key = "IdentityToUserMapping-abc__IdentityToUserMapping-abc";
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let lookup = Arc::new(StaticLookup::new().with(key, "u1"));
    let r = router(dispatcher.clone(), lookup.clone());

    let rec = file_created(
        "e1",
        json!({"bucketName": "b", "filePath": "p", "size": 10, "cognitoIdentityId": "abc"}),
    );
    let report = r.route_record(0, &rec).await;

    assert_eq!(lookup.reads(), vec![key.to_string()]);
    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].body,
        json!({"bucketName": "b", "filePath": "p", "size": 10, "userId": "u1"})
    );
    assert!(matches!(
        report.outcome,
        RecordOutcome::Routed { lookup: Some(LookupOutcome::Resolved(ref id)), .. } if id == "u1"
    ));
}

#[tokio::test]
async fn unknown_identity_still_creates_file() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let r = router(dispatcher.clone(), StaticLookup::new());

    let rec = file_created(
        "e1",
        json!({"bucketName": "b", "filePath": "p", "size": 1, "cognitoIdentityId": "nobody"}),
    );
    let report = r.route_record(0, &rec).await;

    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.get("userId").is_none());
    assert!(matches!(
        report.outcome,
        RecordOutcome::Routed { lookup: Some(LookupOutcome::NotFound), .. }
    ));
}

struct BrokenLookup;

#[async_trait]
impl IdentityLookup for BrokenLookup {
    async fn read_identity_mapping(
        &self,
        _request: &DispatchRequest,
    ) -> Result<LookupResponse, LookupError> {
        Err(LookupError::Transport("connection reset".into()))
    }
}

struct EmptyLookup;

#[async_trait]
impl IdentityLookup for EmptyLookup {
    async fn read_identity_mapping(
        &self,
        _request: &DispatchRequest,
    ) -> Result<LookupResponse, LookupError> {
        Ok(LookupResponse::with_user_id(""))
    }
}

struct StalledLookup;

#[async_trait]
impl IdentityLookup for StalledLookup {
    async fn read_identity_mapping(
        &self,
        _request: &DispatchRequest,
    ) -> Result<LookupResponse, LookupError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(LookupResponse::with_user_id("too-late"))
    }
}

#[tokio::test]
async fn lookup_transport_error_is_tolerated() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let r = router(dispatcher.clone(), BrokenLookup);
    let rec = file_created("e1", json!({"bucketName": "b", "filePath": "p", "cognitoIdentityId": "abc"}));

    let report = r.route_record(0, &rec).await;
    assert_eq!(dispatcher.sent().len(), 1);
    assert!(matches!(
        report.outcome,
        RecordOutcome::Routed { lookup: Some(LookupOutcome::Failed(_)), .. }
    ));
}

#[tokio::test]
async fn empty_user_id_is_not_attached() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let r = router(dispatcher.clone(), EmptyLookup);
    let rec = file_created("e1", json!({"bucketName": "b", "filePath": "p", "cognitoIdentityId": "abc"}));

    let report = r.route_record(0, &rec).await;
    assert!(dispatcher.sent()[0].body.get("userId").is_none());
    assert!(matches!(
        report.outcome,
        RecordOutcome::Routed { lookup: Some(LookupOutcome::NoUserId), .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn stalled_lookup_times_out_and_create_proceeds() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let r = router(dispatcher.clone(), StalledLookup);
    let rec = file_created("e1", json!({"bucketName": "b", "filePath": "p", "cognitoIdentityId": "abc"}));

    let report = r.route_record(0, &rec).await;
    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.get("userId").is_none());
    assert!(matches!(
        report.outcome,
        RecordOutcome::Routed { lookup: Some(LookupOutcome::Failed(ref msg)), .. } if msg.contains("timed out")
    ));
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_delete_dispatches_composite_key() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let r = router(dispatcher.clone(), StaticLookup::new());
    let rec = record(
        "e1",
        "Event",
        json!({"medium": "S3", "source": SELF, "type": "s3File.deleted",
               "data": {"previousAttributes": {"bucketName": "b", "filePath": "p"}}}),
    );

    r.route_record(0, &rec).await;
    assert_eq!(
        dispatcher.sent(),
        vec![DispatchRequest::new(Action::FileDelete, json!({"id": "File-b#p__File-b#p"}))]
    );
}

#[tokio::test]
async fn unchanged_records_are_skipped_without_dispatch() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let r = router(dispatcher.clone(), StaticLookup::new());
    let mut rec = record("e1", "Event", json!({"medium": "EVENT_BRIDGE", "source": SELF}));
    rec.changed = false;

    let report = r.route_record(0, &rec).await;
    assert_eq!(report.outcome, RecordOutcome::Skipped);
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn modified_events_are_skipped_without_dispatch() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let r = router(dispatcher.clone(), StaticLookup::new());
    let mut rec = file_created("e1", json!({"bucketName": "b", "filePath": "p"}));
    rec.operation = Operation::Update;

    let report = r.route_record(0, &rec).await;
    assert_eq!(report.outcome, RecordOutcome::Skipped);
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn watched_models_are_skipped_even_when_bus_shaped() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let r = router(dispatcher.clone(), StaticLookup::new());
    let rec = record("e1", "Order", json!({"medium": "EVENT_BRIDGE", "source": SELF}));

    let report = r.route_record(0, &rec).await;
    assert_eq!(report.outcome, RecordOutcome::Skipped);
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn failed_dispatch_fails_record_but_not_batch() {
    let dispatcher = Arc::new(RecordingDispatcher::failing_on(Action::PublishEvent));
    let r = router(dispatcher.clone(), StaticLookup::new());
    let input = WorkflowInput {
        records: vec![
            record("publish", "Event", json!({"medium": "EVENT_BRIDGE", "source": SELF})),
            record(
                "delete",
                "Event",
                json!({"medium": "S3", "source": SELF, "type": "s3File.deleted",
                       "data": {"previousAttributes": {"bucketName": "b", "filePath": "p"}}}),
            ),
        ],
    };

    let report = r.route_batch(&input).await.expect("batch");
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.records[0].event_id, "publish");
    assert!(matches!(
        report.records[0].outcome,
        RecordOutcome::Failed { action: Action::PublishEvent, .. }
    ));
    assert_eq!(dispatcher.sent().len(), 1, "the other record still dispatches");

    let err = report.into_result().unwrap_err();
    assert!(matches!(err, RouterError::BatchFailed { failed: 1, total: 2 }), "got: {err}");
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SlowDispatcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

#[async_trait]
impl Dispatcher for SlowDispatcher {
    async fn dispatch(&self, _request: &DispatchRequest) -> Result<Value, DispatchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

#[tokio::test(start_paused = true)]
async fn batch_never_exceeds_concurrency_bound() {
    let dispatcher = Arc::new(SlowDispatcher::default());
    let r = Arc::new(Router::new(
        dispatcher.clone(),
        StaticLookup::new(),
        ctx(),
        4,
        TIMEOUT,
    ));
    let input = WorkflowInput {
        records: (0..25)
            .map(|i| {
                record(
                    &format!("e{i}"),
                    "Event",
                    json!({"medium": "EVENT_BRIDGE", "source": SELF}),
                )
            })
            .collect(),
    };

    let report = r.route_batch(&input).await.expect("batch");

    assert_eq!(dispatcher.total.load(Ordering::SeqCst), 25);
    let peak = dispatcher.peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak in-flight {peak} exceeds bound");
    assert!(peak > 1, "records should overlap");
    let ids: Vec<&str> = report.records.iter().map(|r| r.event_id.as_str()).collect();
    assert_eq!(ids.first(), Some(&"e0"));
    assert_eq!(ids.last(), Some(&"e24"), "reports come back in input order");
}

//! End-to-end tracer scenarios against the strict mock agent

use std::fmt;
use std::sync::Arc;
use std::thread;
use tracepath_core::tag::{decode_incoming, decode_string};
use tracepath_core::{IncomingTag, LinkKind, MockAgent};
use tracepath_sdk::{
    Channel, ChannelType, IncomingRemoteCallOptions, IncomingTags, OutgoingTaggable, Sdk,
    ScopeError, TracerError, TracerHandle, TracerKind, TracerState,
};

fn mock_sdk() -> (Sdk, Arc<MockAgent>) {
    let agent = Arc::new(MockAgent::new());
    (Sdk::new(agent.clone()), agent)
}

fn tcp(endpoint: &str) -> Channel {
    Channel::new(ChannelType::TcpIp, Some(endpoint))
}

#[derive(Debug)]
struct CheckoutFailed {
    order: u32,
}

impl fmt::Display for CheckoutFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "checkout of order {} failed", self.order)
    }
}

#[test]
fn single_root_is_archived_without_children() {
    let (sdk, agent) = mock_sdk();
    let r = sdk
        .trace_incoming_remote_call("a", "b", "c", IncomingRemoteCallOptions::default())
        .unwrap();
    r.start().unwrap();
    r.end().unwrap();

    let paths = sdk.completed_paths();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].id(), r.id());
    assert!(paths[0].children().is_empty());
    assert!(agent.violations().is_empty());
}

#[test]
fn nested_children_keep_call_order() {
    let (sdk, _agent) = mock_sdk();
    let db = sdk
        .create_database_info("inventory", "PostgreSQL", tcp("db:5432"))
        .unwrap();
    let root = sdk.trace_custom_service("sync", "inventory").unwrap();
    root.start().unwrap();

    let mut ids = Vec::new();
    for sql in ["SELECT 1", "SELECT 2", "SELECT 3"] {
        let q = sdk.trace_sql_database_request(&db, sql).unwrap();
        q.start().unwrap();
        q.end().unwrap();
        ids.push(q.id());
    }
    root.end().unwrap();

    let children: Vec<_> = root
        .node()
        .children()
        .into_iter()
        .map(|(link, node)| (link, node.id()))
        .collect();
    let expected: Vec<_> = ids.into_iter().map(|id| (LinkKind::Child, id)).collect();
    assert_eq!(children, expected);
}

#[test]
fn ending_with_running_child_fails_until_child_ends() {
    let (sdk, agent) = mock_sdk();
    let root = sdk.trace_custom_service("m", "s").unwrap();
    let child = sdk
        .trace_outgoing_remote_call("m", "s", "e", tcp("h:1"), None)
        .unwrap();
    root.start().unwrap();
    child.start().unwrap();

    let err = root.end().unwrap_err();
    assert!(err.is_structural());
    assert_eq!(root.state(), TracerState::Started);
    assert!(sdk.completed_paths().is_empty());

    child.end().unwrap();
    root.end().unwrap();
    assert_eq!(sdk.completed_paths().len(), 1);
    assert!(agent.violations().is_empty());
}

#[test]
fn outgoing_tag_round_trips_while_started() {
    let (sdk, _agent) = mock_sdk();
    let root = sdk.trace_custom_service("m", "s").unwrap();
    root.start().unwrap();
    let out = sdk
        .trace_outgoing_remote_call("m", "s", "e", tcp("h:1"), Some("http"))
        .unwrap();

    // Not readable before start
    assert!(out.outgoing_string_tag().is_err());
    out.start().unwrap();

    let string_tag = out.outgoing_string_tag().unwrap();
    let byte_tag = out.outgoing_byte_tag().unwrap();
    assert_eq!(decode_string(&string_tag), Some(out.id()));
    assert_eq!(decode_incoming(&IncomingTag::Bytes(byte_tag)), Some(out.id()));

    out.end().unwrap();
    assert!(out.outgoing_string_tag().is_err());
    root.end().unwrap();
}

#[test]
fn start_from_other_thread_is_rejected() {
    let (sdk, agent) = mock_sdk();
    let t = sdk.trace_custom_service("m", "s").unwrap();
    let err = thread::scope(|scope| scope.spawn(|| t.start()).join().unwrap()).unwrap_err();

    assert!(err.is_thread_affinity());
    assert_eq!(t.state(), TracerState::Created);
    assert!(!agent
        .calls()
        .iter()
        .any(|c| matches!(c, tracepath_core::mock::AgentCall::Start(_))));
}

#[test]
fn second_mark_failed_is_rejected() {
    let (sdk, _agent) = mock_sdk();
    let t = sdk.trace_custom_service("m", "s").unwrap();
    t.start().unwrap();
    t.mark_failed("IoError", "disk full").unwrap();

    let err = t.mark_failed("IoError", "again").unwrap_err();
    assert!(matches!(err, TracerError::AlreadyFailed { .. }));
    assert_eq!(t.node().error().unwrap().message, "disk full");
    t.end().unwrap();
}

#[test]
fn outgoing_child_under_root() {
    let (sdk, _agent) = mock_sdk();
    let r = sdk
        .trace_incoming_remote_call("a", "b", "c", IncomingRemoteCallOptions::default())
        .unwrap();
    r.start().unwrap();
    let c = sdk
        .trace_outgoing_remote_call(
            "lookup",
            "CatalogService",
            "catalog://localhost/items",
            tcp("localhost:1234"),
            None,
        )
        .unwrap();
    c.start().unwrap();
    assert!(!c.outgoing_string_tag().unwrap().is_empty());
    c.end().unwrap();
    r.end().unwrap();

    let children = r.node().children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].0, LinkKind::Child);
    assert_eq!(children[0].1.id(), c.id());
    assert!(c.node().error().is_none());
}

#[test]
fn error_from_scoped_block_is_attached_to_child() {
    let (sdk, _agent) = mock_sdk();
    let r = sdk.trace_custom_service("checkout", "shop").unwrap();
    r.start().unwrap();

    let child = sdk
        .trace_outgoing_remote_call("charge", "payments", "pay:443", tcp("pay:443"), None)
        .unwrap();
    let result: Result<(), _> = child.trace(|_| Err(CheckoutFailed { order: 7 }));
    let err = result.unwrap_err().into_operation().unwrap();
    assert_eq!(err.order, 7);

    let info = child.node().error().unwrap();
    assert!(info.class.ends_with("CheckoutFailed"));
    assert_eq!(info.message, "checkout of order 7 failed");
    assert_eq!(child.state(), TracerState::Ended);

    r.end().unwrap();
    assert!(r.node().error().is_none());
    assert_eq!(sdk.completed_paths().len(), 1);
}

#[test]
fn panic_in_scoped_block_is_attached_and_resumed() {
    let (sdk, _agent) = mock_sdk();
    let t = sdk.trace_custom_service("m", "s").unwrap();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<(), ScopeError<CheckoutFailed>> = t.trace(|_| panic!("boom"));
    }));
    assert!(outcome.is_err());
    assert_eq!(t.state(), TracerState::Ended);
    let info = t.node().error().unwrap();
    assert_eq!((info.class.as_str(), info.message.as_str()), ("panic", "boom"));
}

#[test]
fn independent_roots_are_linked_by_tag() {
    let (sdk, agent) = mock_sdk();

    let caller = sdk.trace_custom_service("m", "s").unwrap();
    caller.start().unwrap();
    let x = sdk
        .trace_outgoing_remote_call("m", "s", "e", tcp("h:1"), None)
        .unwrap();
    x.start().unwrap();
    let tag = x.outgoing_byte_tag().unwrap();
    x.end().unwrap();
    caller.end().unwrap();

    let y = sdk
        .trace_incoming_remote_call(
            "m",
            "s",
            "e",
            IncomingRemoteCallOptions {
                tags: IncomingTags::bytes(tag),
                ..Default::default()
            },
        )
        .unwrap();
    y.start().unwrap();
    y.end().unwrap();

    // Y completed as its own root
    assert_eq!(sdk.completed_paths().len(), 2);
    assert!(y.node().linked_parent().is_none());

    let unresolved = sdk.resolve_pending();
    assert!(unresolved.is_empty());
    assert_eq!(y.node().linked_parent().unwrap().id(), x.id());
    assert!(x
        .node()
        .children()
        .iter()
        .any(|(link, node)| *link == LinkKind::TagLinked && node.id() == y.id()));
    assert!(agent.violations().is_empty());
}

#[test]
fn remote_calls_served_on_worker_threads() {
    let (sdk, agent) = mock_sdk();
    let db = sdk
        .create_database_info("orders", "PostgreSQL", tcp("db:5432"))
        .unwrap();

    let root = sdk
        .trace_incoming_remote_call("main", "main", "main", Default::default())
        .unwrap();
    root.start().unwrap();

    let mut served = Vec::new();
    for i in 0..3u32 {
        let out = sdk
            .trace_outgoing_remote_call(
                "remote",
                "RemoteService",
                "worker",
                tcp("worker:1"),
                Some("thread"),
            )
            .unwrap();
        out.start().unwrap();
        let tag = out.outgoing_string_tag().unwrap();

        let worker_sdk = sdk.clone();
        let worker_db = db.clone();
        let incoming_id = thread::spawn(move || {
            let incoming = worker_sdk
                .trace_incoming_remote_call(
                    "remote",
                    "RemoteService",
                    "worker",
                    IncomingRemoteCallOptions {
                        protocol_name: Some("thread".to_string()),
                        tags: IncomingTags::string(tag),
                    },
                )
                .unwrap();
            let _ = incoming.trace(|_| {
                for sql in ["SELECT * FROM orders", "UPDATE orders SET done = 1"] {
                    let q = worker_sdk.trace_sql_database_request(&worker_db, sql).unwrap();
                    q.trace(|q| q.set_returned_row_count(1)).unwrap();
                }
                if i == 2 {
                    return Err(CheckoutFailed { order: i });
                }
                Ok(())
            });
            incoming.id()
        })
        .join()
        .unwrap();

        out.end().unwrap();
        served.push((out.id(), incoming_id));
    }
    root.end().unwrap();

    // Main path plus one path per worker
    assert_eq!(sdk.completed_paths().len(), 4);
    assert!(sdk.resolve_pending().is_empty());

    let archive = sdk.session().archive();
    for (n, (out_id, incoming_id)) in served.iter().enumerate() {
        let incoming = archive.find(*incoming_id).unwrap();
        assert_eq!(incoming.linked_parent().unwrap().id(), *out_id);
        assert_eq!(incoming.children().len(), 2);
        assert_eq!(incoming.error().is_some(), n == 2);
    }
    assert_eq!(sdk.metrics().created_count(TracerKind::DatabaseRequest), 6);
    assert!(agent.violations().is_empty());
    assert_eq!(agent.live_tracers(), 0);
}

#[test]
fn archive_serializes_completed_tree() {
    let (sdk, _agent) = mock_sdk();
    let root = sdk.trace_custom_service("m", "s").unwrap();
    root.trace(|_| {
        let child = sdk
            .trace_outgoing_remote_call("m", "s", "e", tcp("h:1"), None)
            .unwrap();
        child.trace(|_| Ok::<_, CheckoutFailed>(()))
    })
    .unwrap();

    let json: serde_json::Value = sdk.session().archive().to_json();
    let text = serde_json::to_string(&json).unwrap();
    assert!(text.contains("outgoing_remote_call"));
    assert_eq!(json.as_array().unwrap().len(), 1);
}

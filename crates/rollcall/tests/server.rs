//! Integration tests for the Rollcall server, handler, and full connection flow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rollcall::prelude::*;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

const SECRET: &[u8] = b"integration-secret";

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// =========================================================================
// Helpers
// =========================================================================

/// A `MemoryStore` whose batch writes can be switched off.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl RosterStore for FlakyStore {
    async fn find_class(&self, class_id: &ClassId) -> Result<Option<ClassRecord>, StoreError> {
        self.inner.find_class(class_id).await
    }

    async fn find_class_with_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> Result<Option<ClassRecord>, StoreError> {
        self.inner.find_class_with_student(class_id, student_id).await
    }

    async fn list_students_of_class(&self, class_id: &ClassId) -> Result<Vec<UserId>, StoreError> {
        self.inner.list_students_of_class(class_id).await
    }
}

impl AttendanceStore for FlakyStore {
    async fn insert_batch(&self, records: &[AttendanceRecord]) -> Result<usize, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Task("database is down".into()));
        }
        self.inner.insert_batch(records).await
    }

    async fn find_attendance(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.inner.find_attendance(class_id, student_id).await
    }
}

struct TestServer<S = MemoryStore> {
    addr: String,
    store: Arc<S>,
    control: SessionControl<S>,
    class: ClassId,
}

/// Enrolls `S1`, `S2`, `S3` in class `C` taught by `T`. `S9` exists but is
/// not enrolled.
fn chemistry(store: &MemoryStore) -> ClassId {
    let class = store.add_class("C", "Chemistry", "T");
    for student in ["S1", "S2", "S3"] {
        store.enroll(&class, student).unwrap();
    }
    class
}

async fn start_server(config: ServerConfig) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let class = chemistry(&store);
    serve(store, class, config).await
}

async fn serve<S>(store: Arc<S>, class: ClassId, config: ServerConfig) -> TestServer<S>
where
    S: RosterStore + AttendanceStore,
{
    let server = RollCallServerBuilder::new()
        .bind("127.0.0.1:0")
        .config(config)
        .build(JwtAuthenticator::new(SECRET), Arc::clone(&store))
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let control = server.control();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer {
        addr,
        store,
        control,
        class,
    }
}

async fn start_session<S: RosterStore>(server: &TestServer<S>) {
    server
        .control
        .start_session(&Identity::teacher("T"), server.class.clone())
        .await
        .expect("session should start");
}

fn token(identity: &Identity) -> String {
    JwtAuthenticator::new(SECRET)
        .issue(identity, None)
        .expect("token should sign")
}

async fn connect_raw(addr: &str, query: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/{query}"))
        .await
        .expect("should connect");
    ws
}

async fn connect_as(addr: &str, identity: &Identity) -> ClientWs {
    connect_raw(addr, &format!("?token={}", token(identity))).await
}

async fn send(ws: &mut ClientWs, event: &str, data: Value) {
    let frame = json!({ "event": event, "data": data });
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// Reads the next data frame as JSON.
async fn recv(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("recv error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("json frame"),
            Message::Binary(data) => return serde_json::from_slice(&data).expect("json frame"),
            Message::Close(_) => panic!("connection closed while waiting for a frame"),
            _ => continue,
        }
    }
}

/// Asserts the server closes the connection without sending more data.
async fn assert_closed(ws: &mut ClientWs) {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for close");
        match next {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(other)) => panic!("expected close, got {other:?}"),
        }
    }
}

fn error_message(frame: &Value) -> &str {
    assert_eq!(frame["event"], "ERROR", "expected ERROR, got {frame}");
    frame["data"]["message"].as_str().expect("message")
}

// =========================================================================
// Gateway
// =========================================================================

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let server = start_server(ServerConfig::default()).await;
    let mut ws = connect_raw(&server.addr, "").await;

    let frame = recv(&mut ws).await;
    assert_eq!(error_message(&frame), "token not found");
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_repeated_token_is_rejected() {
    let server = start_server(ServerConfig::default()).await;
    let t = token(&Identity::teacher("T"));
    let mut ws = connect_raw(&server.addr, &format!("?token={t}&token={t}")).await;

    let frame = recv(&mut ws).await;
    assert_eq!(error_message(&frame), "token not found");
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let server = start_server(ServerConfig::default()).await;
    let mut ws = connect_raw(&server.addr, "?token=not-a-jwt").await;

    let frame = recv(&mut ws).await;
    assert_eq!(error_message(&frame), "unauthorized or invalid token");
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_custom_token_param() {
    let server = start_server(ServerConfig {
        token_param: "auth".into(),
        ..ServerConfig::default()
    })
    .await;
    start_session(&server).await;

    let query = format!("?auth={}", token(&Identity::student("S1")));
    let mut ws = connect_raw(&server.addr, &query).await;
    send(&mut ws, "MY_ATTENDANCE", json!({})).await;
    let frame = recv(&mut ws).await;
    assert_eq!(frame["event"], "MY_ATTENDANCE");
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let server = start_server(ServerConfig {
        idle_timeout: Some(Duration::from_millis(100)),
        ..ServerConfig::default()
    })
    .await;
    let mut ws = connect_as(&server.addr, &Identity::student("S1")).await;
    assert_closed(&mut ws).await;
}

// =========================================================================
// Roll call
// =========================================================================

#[tokio::test]
async fn test_full_roll_call_over_websocket() {
    let server = start_server(ServerConfig::default()).await;
    start_session(&server).await;

    let mut teacher = connect_as(&server.addr, &Identity::teacher("T")).await;
    let mut s1 = connect_as(&server.addr, &Identity::student("S1")).await;

    // Round trips so both connections are registered for broadcasts.
    send(&mut s1, "MY_ATTENDANCE", json!({})).await;
    assert_eq!(
        recv(&mut s1).await,
        json!({ "event": "MY_ATTENDANCE", "data": { "status": "not yet updated" } })
    );
    send(&mut teacher, "TODAY_SUMMARY", json!({})).await;
    let summary = json!({ "event": "TODAY_SUMMARY", "data": { "present": 0, "absent": 0, "total": 0 } });
    assert_eq!(recv(&mut teacher).await, summary);
    assert_eq!(recv(&mut s1).await, summary);

    for student in ["S1", "S3"] {
        send(
            &mut teacher,
            "ATTENDANCE_MARKED",
            json!({ "studentId": student, "status": "present" }),
        )
        .await;
        let marked = json!({
            "event": "ATTENDANCE_MARKED",
            "data": { "studentId": student, "status": "present" }
        });
        assert_eq!(recv(&mut teacher).await, marked);
        assert_eq!(recv(&mut s1).await, marked);
    }

    send(&mut s1, "MY_ATTENDANCE", json!({})).await;
    assert_eq!(recv(&mut s1).await["data"]["status"], "present");

    send(&mut teacher, "DONE", json!({})).await;
    let done = json!({
        "event": "DONE",
        "data": { "message": "attendance persisted", "present": 2, "absent": 1, "total": 3 }
    });
    assert_eq!(recv(&mut teacher).await, done);
    assert_eq!(recv(&mut s1).await, done);

    let records = server.store.records();
    assert_eq!(records.len(), 3);
    let s2 = records
        .iter()
        .find(|r| r.student_id == UserId::from("S2"))
        .expect("S2 recorded");
    assert_eq!(s2.status, AttendanceStatus::Absent);
    assert!(server.control.active_session().await.is_none());

    // Back to idle: the next event is refused and the connection closed.
    send(&mut teacher, "TODAY_SUMMARY", json!({})).await;
    assert_eq!(error_message(&recv(&mut teacher).await), "no active attendance session");
    assert_closed(&mut teacher).await;
}

#[tokio::test]
async fn test_student_not_enrolled_is_disconnected() {
    let server = start_server(ServerConfig::default()).await;
    start_session(&server).await;

    let mut outsider = connect_as(&server.addr, &Identity::student("S9")).await;
    send(&mut outsider, "MY_ATTENDANCE", json!({})).await;
    assert_eq!(error_message(&recv(&mut outsider).await), "not enrolled in this class");
    assert_closed(&mut outsider).await;

    let active = server.control.active_session().await.expect("still active");
    assert!(active.attendance.is_empty());
}

#[tokio::test]
async fn test_student_sending_teacher_event_is_disconnected() {
    let server = start_server(ServerConfig::default()).await;
    start_session(&server).await;

    let mut student = connect_as(&server.addr, &Identity::student("S1")).await;
    send(
        &mut student,
        "ATTENDANCE_MARKED",
        json!({ "studentId": "S1", "status": "present" }),
    )
    .await;
    assert_eq!(
        error_message(&recv(&mut student).await),
        "forbidden, teacher event only"
    );
    assert_closed(&mut student).await;
}

#[tokio::test]
async fn test_event_while_idle_is_rejected() {
    let server = start_server(ServerConfig::default()).await;
    let mut teacher = connect_as(&server.addr, &Identity::teacher("T")).await;

    send(&mut teacher, "DONE", json!({})).await;
    assert_eq!(error_message(&recv(&mut teacher).await), "no active attendance session");
    assert_closed(&mut teacher).await;
    assert!(server.store.records().is_empty());
}

#[tokio::test]
async fn test_bad_payload_and_unknown_event_keep_connection_open() {
    let server = start_server(ServerConfig::default()).await;
    start_session(&server).await;
    let mut teacher = connect_as(&server.addr, &Identity::teacher("T")).await;

    send(&mut teacher, "WAVE", json!({ "hello": true })).await;
    send(
        &mut teacher,
        "ATTENDANCE_MARKED",
        json!({ "studentId": "S1", "status": "late" }),
    )
    .await;
    let frame = recv(&mut teacher).await;
    assert!(error_message(&frame).starts_with("invalid payload for ATTENDANCE_MARKED:"));
    assert!(!error_message(&frame).contains("invalid payload: invalid payload"));

    // Still connected and authorized.
    send(&mut teacher, "TODAY_SUMMARY", json!({})).await;
    assert_eq!(recv(&mut teacher).await["event"], "TODAY_SUMMARY");
}

#[tokio::test]
async fn test_failed_persist_keeps_teacher_connected_and_done_retries() {
    let store = Arc::new(FlakyStore::default());
    let class = chemistry(&store.inner);
    let server = serve(Arc::clone(&store), class, ServerConfig::default()).await;
    start_session(&server).await;

    let mut teacher = connect_as(&server.addr, &Identity::teacher("T")).await;
    send(
        &mut teacher,
        "ATTENDANCE_MARKED",
        json!({ "studentId": "S1", "status": "present" }),
    )
    .await;
    assert_eq!(recv(&mut teacher).await["event"], "ATTENDANCE_MARKED");

    store.fail_writes.store(true, Ordering::SeqCst);
    send(&mut teacher, "DONE", json!({})).await;
    let frame = recv(&mut teacher).await;
    assert!(error_message(&frame).starts_with("failed to persist attendance"));
    assert!(server.store.inner.records().is_empty());

    // The connection survives and the session kept its marks.
    send(&mut teacher, "TODAY_SUMMARY", json!({})).await;
    assert_eq!(
        recv(&mut teacher).await,
        json!({ "event": "TODAY_SUMMARY", "data": { "present": 1, "absent": 0, "total": 1 } })
    );

    store.fail_writes.store(false, Ordering::SeqCst);
    send(&mut teacher, "DONE", json!({})).await;
    assert_eq!(
        recv(&mut teacher).await,
        json!({
            "event": "DONE",
            "data": { "message": "attendance persisted", "present": 1, "absent": 2, "total": 3 }
        })
    );
    assert_eq!(server.store.inner.records().len(), 3);
    assert!(server.control.active_session().await.is_none());
}

//! Integration tests for the Keystone session and Heat client against a
//! canned HTTP server on localhost.

use std::sync::Arc;

use heat_api::{
    ApiError, Credentials, KeystoneSession, OrchestrationClient, SessionProvider, StackCreate,
    StackStatus,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Canned reply: status, extra headers, JSON body.
struct Reply {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl Reply {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// Receives method, request target and the server base URL.
type Handler = Arc<dyn Fn(&str, &str, &str) -> Reply + Send + Sync>;

fn handler<F>(f: F) -> Handler
where
    F: Fn(&str, &str, &str) -> Reply + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Raw request heads seen by the server, in arrival order.
type RequestLog = Arc<Mutex<Vec<String>>>;

async fn start_server(handler: Handler) -> (String, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));

    let server_base = base.clone();
    let server_log = log.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let handler = handler.clone();
            let log = server_log.clone();
            let base = server_base.clone();
            tokio::spawn(async move {
                let _ = serve_one(socket, handler, log, base).await;
            });
        }
    });

    (base, log)
}

async fn serve_one(
    mut socket: TcpStream,
    handler: Handler,
    log: RequestLog,
    base: String,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    log.lock().push(head.clone());

    let reply = handler(&method, &target, &base);
    let mut response = format!(
        "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    response.push_str(&reply.body);

    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

fn v3_token_reply(base: &str) -> Reply {
    Reply::json(
        201,
        json!({
            "token": {
                "catalog": [
                    {
                        "type": "identity",
                        "endpoints": [{"interface": "public", "url": format!("{}/v3", base), "region_id": "RegionOne"}]
                    },
                    {
                        "type": "orchestration",
                        "endpoints": [
                            {"interface": "internal", "url": format!("{}/internal/v1/p-1", base), "region_id": "RegionOne"},
                            {"interface": "public", "url": format!("{}/heat/v1/p-1", base), "region_id": "RegionOne"}
                        ]
                    }
                ]
            }
        }),
    )
    .header("X-Subject-Token", "tok-123")
}

fn stack_json(status: &str) -> serde_json::Value {
    json!({
        "stack": {
            "id": "id-1",
            "stack_name": "demo",
            "stack_status": status,
            "stack_status_reason": "Stack CREATE completed successfully",
            "creation_time": "2024-03-01T10:00:00Z",
            "updated_time": null
        }
    })
}

fn credentials(base: &str) -> Credentials {
    Credentials::new("alice", "secret", "demo", format!("{}/v3", base)).region("RegionOne")
}

#[tokio::test]
async fn test_v3_session_then_stack_lookup() {
    let handler = handler(|method, target, base| match (method, target) {
        ("POST", "/v3/auth/tokens") => v3_token_reply(base),
        ("GET", "/heat/v1/p-1/stacks/demo") => Reply::json(200, stack_json("CREATE_COMPLETE")),
        _ => Reply::json(404, json!({"explanation": "no route"})),
    });
    let (base, log) = start_server(handler).await;

    let client = KeystoneSession::new()
        .authenticate(&credentials(&base))
        .await
        .unwrap();
    assert_eq!(client.endpoint(), format!("{}/heat/v1/p-1", base));

    let stack = client.get_stack("demo").await.unwrap().unwrap();
    assert_eq!(stack.id, "id-1");
    assert_eq!(stack.status, StackStatus::create_complete());
    assert!(stack.creation_time.is_some());

    let heads = log.lock();
    let lookup = heads.last().unwrap().to_lowercase();
    assert!(lookup.contains("x-auth-token: tok-123"));
}

#[tokio::test]
async fn test_missing_stack_is_none() {
    let handler = handler(|method, target, base| match (method, target) {
        ("POST", "/v3/auth/tokens") => v3_token_reply(base),
        _ => Reply::json(
            404,
            json!({"explanation": "The resource could not be found.", "error": {"message": "The Stack (ghost) could not be found."}}),
        ),
    });
    let (base, _log) = start_server(handler).await;

    let client = KeystoneSession::new()
        .authenticate(&credentials(&base))
        .await
        .unwrap();
    assert!(client.get_stack("ghost").await.unwrap().is_none());
    assert!(client.get_deployment("dep-x").await.unwrap().is_none());
    assert!(!client.delete_stack("ghost").await.unwrap());
}

#[tokio::test]
async fn test_delete_uses_canonical_path() {
    let handler = handler(|method, target, base| match (method, target) {
        ("POST", "/v3/auth/tokens") => v3_token_reply(base),
        ("GET", "/heat/v1/p-1/stacks/demo") => Reply::json(200, stack_json("CREATE_COMPLETE")),
        ("DELETE", "/heat/v1/p-1/stacks/demo/id-1") => Reply::empty(204),
        _ => Reply::json(404, json!({})),
    });
    let (base, log) = start_server(handler).await;

    let client = KeystoneSession::new()
        .authenticate(&credentials(&base))
        .await
        .unwrap();
    assert!(client.delete_stack("demo").await.unwrap());

    let heads = log.lock();
    assert!(heads.iter().any(|h| h.starts_with("DELETE /heat/v1/p-1/stacks/demo/id-1 ")));
}

#[tokio::test]
async fn test_create_conflict_keeps_remote_text() {
    let handler = handler(|method, target, base| match (method, target) {
        ("POST", "/v3/auth/tokens") => v3_token_reply(base),
        ("POST", "/heat/v1/p-1/stacks") => Reply::json(
            409,
            json!({"error": {"message": "The Stack (demo) already exists."}}),
        ),
        _ => Reply::json(404, json!({})),
    });
    let (base, _log) = start_server(handler).await;

    let client = KeystoneSession::new()
        .authenticate(&credentials(&base))
        .await
        .unwrap();
    let err = client
        .create_stack(&StackCreate::new("demo", json!({"heat_template_version": "2016-10-14"})))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Conflict(ref msg) if msg == "The Stack (demo) already exists."));
}

#[tokio::test]
async fn test_resource_listing_sends_depth_and_maps_parent() {
    let handler = handler(|method, target, base| match (method, target) {
        ("POST", "/v3/auth/tokens") => v3_token_reply(base),
        ("GET", "/heat/v1/p-1/stacks/demo/resources?nested_depth=5") => Reply::json(
            200,
            json!({
                "resources": [{
                    "resource_name": "db",
                    "resource_type": "OS::Cinder::Volume",
                    "resource_status": "CREATE_FAILED",
                    "resource_status_reason": "Quota exceeded",
                    "physical_resource_id": "",
                    "links": [
                        {"href": format!("{}/heat/v1/p-1/stacks/demo-inner/inner-id/resources/db", base), "rel": "self"},
                        {"href": format!("{}/heat/v1/p-1/stacks/demo-inner/inner-id", base), "rel": "stack"}
                    ]
                }]
            }),
        ),
        _ => Reply::json(404, json!({})),
    });
    let (base, _log) = start_server(handler).await;

    let client = KeystoneSession::new()
        .authenticate(&credentials(&base))
        .await
        .unwrap();
    let resources = client.list_resources("demo", 5).await.unwrap();

    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].parent_stack_id.as_deref(), Some("inner-id"));
    assert_eq!(resources[0].status_reason, "Quota exceeded");
}

#[tokio::test]
async fn test_v2_rejected_credentials() {
    let handler = handler(|method, target, _base| match (method, target) {
        ("POST", "/v2.0/tokens") => Reply::json(
            401,
            json!({"error": {"message": "The request you have made requires authentication.", "code": 401}}),
        ),
        _ => Reply::json(404, json!({})),
    });
    let (base, _log) = start_server(handler).await;

    let credentials = Credentials::new("alice", "wrong", "demo", format!("{}/v2.0/", base));
    let err = KeystoneSession::new()
        .authenticate(&credentials)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Authentication(ref msg) if msg.contains("requires authentication")));
}

#[tokio::test]
async fn test_missing_orchestration_service() {
    let handler = handler(|method, target, base| match (method, target) {
        ("POST", "/v3/auth/tokens") => Reply::json(
            201,
            json!({"token": {"catalog": [{"type": "identity", "endpoints": [{"interface": "public", "url": base}]}]}}),
        )
        .header("X-Subject-Token", "tok-1"),
        _ => Reply::json(404, json!({})),
    });
    let (base, _log) = start_server(handler).await;

    let err = KeystoneSession::new()
        .authenticate(&credentials(&base))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::EndpointNotFound(_)));
}

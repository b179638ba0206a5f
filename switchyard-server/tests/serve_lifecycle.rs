//! Integration test: real sockets, real HTTP/1 requests.
//!
//! Each test binds on an OS-assigned port, serves until a shutdown signal and
//! talks to the server with a plain hyper client.

use std::sync::{Arc, Mutex};

use http_body_util::{BodyExt, Empty};
use hyper::{body::Bytes, Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use switchyard_core::{Failure, Kind, TypedError, UnclassifiedExt};
use switchyard_server::{Bound, Diagnostics, Route, Server, ServerConfig};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle};

#[derive(Default)]
struct Recorder(Mutex<Vec<TypedError>>);

impl Diagnostics for Recorder {
    fn report(&self, err: &TypedError) {
        match self.0.lock() {
            Ok(mut r) => r.push(err.clone()),
            Err(e) => panic!("recorder lock poisoned: {e}"),
        }
    }
}

struct Running {
    port: u16,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Running {
    async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            panic!("server task failed: {e}");
        }
    }
}

fn start(bound: Bound) -> Running {
    let port = bound.local_addr().port();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let signal = async move {
            let _ = stopped.await;
        };
        if let Err(e) = bound.serve_with_shutdown(signal).await {
            panic!("serve failed: {e}");
        }
    });
    Running { port, stop, task }
}

async fn bind(server: Server) -> Bound {
    match server.bind().await {
        Ok(b) => b,
        Err(e) => panic!("bind failed: {e}"),
    }
}

async fn request(port: u16, method: Method, path: &str) -> (StatusCode, Option<String>, Bytes) {
    let stream = match TcpStream::connect(("127.0.0.1", port)).await {
        Ok(s) => s,
        Err(e) => panic!("connect failed: {e}"),
    };
    let (mut sender, conn) = match hyper::client::conn::http1::handshake(TokioIo::new(stream)).await {
        Ok(pair) => pair,
        Err(e) => panic!("handshake failed: {e}"),
    };
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = match Request::builder()
        .method(method)
        .uri(path)
        .header("Host", "localhost")
        .body(Empty::<Bytes>::new())
    {
        Ok(r) => r,
        Err(e) => panic!("failed to build request: {e}"),
    };
    let resp = match sender.send_request(req).await {
        Ok(r) => r,
        Err(e) => panic!("request failed: {e}"),
    };
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = match resp.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(e) => panic!("failed to read body: {e}"),
    };
    (status, content_type, body)
}

fn json_body(bytes: &Bytes) -> Value {
    match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => panic!("invalid JSON {:?}: {e}", String::from_utf8_lossy(bytes)),
    }
}

fn user_service(recorder: Arc<Recorder>) -> Server {
    let config = ServerConfig::builder().diagnostics(recorder).build();
    Server::new("api", config).add_routes([
        Route::get("users", |_req, _reply| async {
            Ok::<_, Failure>(json!({"id": 1, "name": "Hunter"}))
        }),
        Route::get("/users/{id}", |_req, _reply| async {
            Err::<(), _>(TypedError::new(Kind::Invalid, "Invalid User ID").with_code(400).into())
        }),
        Route::get("//empty", |_req, _reply| async { Ok::<_, Failure>(()) }),
        Route::get("/broken", |_req, _reply| async {
            let n: u32 = "not a number".parse().unclassified()?;
            Ok::<_, Failure>(n)
        }),
        Route::get("/uncoded", |_req, _reply| async {
            Err::<(), _>(TypedError::new(Kind::Internal, "no code chosen").into())
        }),
        Route::get("/users", |_req, _reply| async { Ok::<_, Failure>("duplicate") }),
    ])
}

#[tokio::test]
async fn user_service_scenarios_over_http() {
    let recorder = Arc::new(Recorder::default());
    let server = user_service(recorder.clone());
    let running = start(bind(server).await);

    let (status, content_type, body) = request(running.port, Method::GET, "/api/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(json_body(&body), json!({"id": 1, "name": "Hunter"}));

    let (status, _, body) = request(running.port, Method::GET, "/api/users/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json_body(&body);
    assert_eq!(body["code"], 400);
    assert_eq!(body["err"], "Invalid User ID");

    let (status, _, body) = request(running.port, Method::GET, "/api/empty").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), Value::Null);

    let (status, _, body) = request(running.port, Method::GET, "/api/broken").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(&body);
    assert_eq!(body["kind"], 1, "opaque errors are reported as Invalid");
    assert_eq!(body["code"], 500);

    let (status, _, body) = request(running.port, Method::GET, "/api/uncoded").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["code"], 500);

    running.shutdown().await;

    let reports = match recorder.0.lock() {
        Ok(r) => r.clone(),
        Err(e) => panic!("recorder lock poisoned: {e}"),
    };
    assert_eq!(reports.len(), 1, "only the duplicate /users route is reported");
    assert_eq!(reports[0].code, 422);
}

#[tokio::test]
async fn servers_without_port_get_distinct_ports() {
    let (a, b) = tokio::join!(
        bind(Server::new("alpha", ServerConfig::default())),
        bind(Server::new("beta", ServerConfig::default())),
    );
    let (pa, pb) = (a.local_addr().port(), b.local_addr().port());
    assert_ne!(pa, 0);
    assert_ne!(pb, 0);
    assert_ne!(pa, pb, "each server must get its own port");

    let (a, b) = (start(a), start(b));
    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn explicit_port_in_use_is_a_bind_error() {
    let first = bind(Server::new("first", ServerConfig::default())).await;
    let taken = first.local_addr().port();

    let config = ServerConfig::builder().port(taken).build();
    match Server::new("second", config).bind().await {
        Err(switchyard_server::ServerError::Bind { port, .. }) => assert_eq!(port, taken),
        other => panic!("expected a bind error, got {other:?}"),
    }
}

//! Integration test: serving over TLS with the default policy.
//!
//! Uses the certificate fixtures in `tests/fixtures` (a test CA and a
//! `localhost` leaf signed by it).

use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use http_body_util::{BodyExt, Empty};
use hyper::{body::Bytes, Request, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::{pki_types::ServerName, ClientConfig, RootCertStore};
use switchyard_core::{Failure, Kind, TypedError};
use switchyard_server::{Diagnostics, Route, Server, ServerConfig};
use tokio::{io::AsyncWriteExt, net::TcpStream, sync::oneshot};
use tokio_rustls::TlsConnector;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn connector() -> TlsConnector {
    let file = match File::open(fixture("ca.crt")) {
        Ok(f) => f,
        Err(e) => panic!("missing CA fixture: {e}"),
    };
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
        let cert = match cert {
            Ok(c) => c,
            Err(e) => panic!("bad CA fixture: {e}"),
        };
        if let Err(e) = roots.add(cert) {
            panic!("CA rejected: {e}");
        }
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = match ClientConfig::builder_with_provider(provider).with_safe_default_protocol_versions() {
        Ok(b) => b.with_root_certificates(roots).with_no_client_auth(),
        Err(e) => panic!("client config: {e}"),
    };
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    TlsConnector::from(Arc::new(config))
}

#[tokio::test]
async fn tls_server_answers_http1_and_refuses_h2() {
    let config = ServerConfig::builder()
        .tls()
        .cert_files(fixture("server.crt"), fixture("server.key"))
        .build();
    let server = Server::new("secure", config)
        .add_routes([Route::get("/ping", |_req, _reply| async { Ok::<_, Failure>("pong") })]);
    let bound = match server.bind().await {
        Ok(b) => b,
        Err(e) => panic!("bind failed: {e}"),
    };
    let port = bound.local_addr().port();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(bound.serve_with_shutdown(async move {
        let _ = stopped.await;
    }));

    let tcp = match TcpStream::connect(("127.0.0.1", port)).await {
        Ok(s) => s,
        Err(e) => panic!("connect failed: {e}"),
    };
    let name = match ServerName::try_from("localhost") {
        Ok(n) => n,
        Err(e) => panic!("invalid server name: {e}"),
    };
    let tls = match connector().connect(name, tcp).await {
        Ok(s) => s,
        Err(e) => panic!("handshake failed: {e}"),
    };
    assert_eq!(tls.get_ref().1.alpn_protocol(), Some(&b"http/1.1"[..]), "HTTP/2 must not be negotiated");

    let (mut sender, conn) = match hyper::client::conn::http1::handshake(TokioIo::new(tls)).await {
        Ok(pair) => pair,
        Err(e) => panic!("http handshake failed: {e}"),
    };
    tokio::spawn(async move {
        let _ = conn.await;
    });
    let req = match Request::builder()
        .uri("/secure/ping")
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
    assert_eq!(resp.status(), StatusCode::OK);
    let body = match resp.into_body().collect().await {
        Ok(b) => b.to_bytes(),
        Err(e) => panic!("failed to read body: {e}"),
    };
    assert_eq!(&body[..], br#""pong""#);

    drop(sender);
    let _ = stop.send(());
    match task.await {
        Ok(Ok(())) => {}
        other => panic!("server did not stop cleanly: {other:?}"),
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<TypedError>>);

impl Recorder {
    fn reports(&self) -> Vec<TypedError> {
        match self.0.lock() {
            Ok(r) => r.clone(),
            Err(e) => panic!("recorder lock poisoned: {e}"),
        }
    }
}

impl Diagnostics for Recorder {
    fn report(&self, err: &TypedError) {
        match self.0.lock() {
            Ok(mut r) => r.push(err.clone()),
            Err(e) => panic!("recorder lock poisoned: {e}"),
        }
    }
}

#[tokio::test]
async fn client_hanging_up_mid_request_is_reported() {
    let recorder = Arc::new(Recorder::default());
    let config = ServerConfig::builder()
        .tls()
        .cert_files(fixture("server.crt"), fixture("server.key"))
        .diagnostics(recorder.clone())
        .build();
    let server = Server::new("secure", config)
        .add_routes([Route::get("/ping", |_req, _reply| async { Ok::<_, Failure>("pong") })]);
    let bound = match server.bind().await {
        Ok(b) => b,
        Err(e) => panic!("bind failed: {e}"),
    };
    let port = bound.local_addr().port();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(bound.serve_with_shutdown(async move {
        let _ = stopped.await;
    }));

    let tcp = match TcpStream::connect(("127.0.0.1", port)).await {
        Ok(s) => s,
        Err(e) => panic!("connect failed: {e}"),
    };
    let name = match ServerName::try_from("localhost") {
        Ok(n) => n,
        Err(e) => panic!("invalid server name: {e}"),
    };
    let mut tls = match connector().connect(name, tcp).await {
        Ok(s) => s,
        Err(e) => panic!("handshake failed: {e}"),
    };
    if let Err(e) = tls.write_all(b"GET /secure/ping HTTP/1.1\r\nHost: local").await {
        panic!("write failed: {e}");
    }
    if let Err(e) = tls.flush().await {
        panic!("flush failed: {e}");
    }
    drop(tls);

    let mut reports = Vec::new();
    for _ in 0..50 {
        reports = recorder.reports();
        if !reports.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(reports.len(), 1, "one report for the broken connection");
    assert_eq!(reports[0].kind, Kind::Io);
    assert_eq!(reports[0].op, "serve_tls");

    let _ = stop.send(());
    match task.await {
        Ok(Ok(())) => {}
        other => panic!("server did not stop cleanly: {other:?}"),
    }
}

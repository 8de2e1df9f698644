//! End-to-end tests over real sockets.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use qsonac::app::{AppResult, Chunks, ResponseBody};
use qsonac::http::{Environ, Responder};
use qsonac::{Application, MessageApp};

mod common;

/// Replies "hi"; `/slow` sleeps first.
struct Hello;

impl Application for Hello {
    fn call<'e>(
        &self,
        environ: &'e mut Environ<'_>,
        responder: &mut Responder<'_>,
    ) -> AppResult<Box<dyn ResponseBody + 'e>> {
        if environ.path_info() == "/slow" {
            std::thread::sleep(Duration::from_millis(800));
        }
        responder.start_response("200 OK", [("Content-Type", "text/plain")])?;
        Ok(Box::new(Chunks::once("hi")))
    }
}

/// Reads `Content-Length` bytes of input and sends them back.
struct Upload;

impl Application for Upload {
    fn call<'e>(
        &self,
        environ: &'e mut Environ<'_>,
        responder: &mut Responder<'_>,
    ) -> AppResult<Box<dyn ResponseBody + 'e>> {
        let len = environ.content_length().unwrap_or(0);
        let mut body = Vec::new();
        environ.input().take(len).read_to_end(&mut body)?;

        responder.start_response("200 OK", [("Content-Length", body.len().to_string())])?;
        Ok(Box::new(Chunks::once(body)))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_exact_response() {
    let server = common::start_server(common::test_config(), Arc::new(Hello)).await;

    let out = common::send_raw(
        server.addr,
        b"GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec(),
    )
    .await;

    let prefix = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nConnection: close\r\nServer: qsonac/test\r\nDate: ";
    assert!(out.starts_with(prefix), "{out}");
    assert!(out.ends_with(" GMT\r\n\r\nhi"), "{out}");

    server.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_configured_message() {
    let mut config = common::test_config();
    config.app.message = "configured body".into();
    let app = Arc::new(MessageApp::new(config.app.message.clone()));
    let server = common::start_server(config, app).await;

    let out = common::send_raw(server.addr, b"GET / HTTP/1.0\r\n\r\n".to_vec()).await;
    assert!(out.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(out.contains("Content-Length: 15\r\n"));
    assert!(out.ends_with("configured body"));

    server.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlong_request_line_gets_414() {
    let server = common::start_server(common::test_config(), Arc::new(Hello)).await;

    let mut request = b"GET /".to_vec();
    request.resize(65_536, b'a');

    let out = common::send_raw(server.addr, request).await;
    assert!(out.starts_with("HTTP/1.1 414 Request-URI Too Long\r\n"), "{out}");
    assert!(out.contains("<p>Error code: 414</p>"));

    server.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn far_overlong_request_line_still_gets_414() {
    let server = common::start_server(common::test_config(), Arc::new(Hello)).await;

    // Most of this line is still unread when the server answers.
    let mut request = b"GET /".to_vec();
    request.resize(300_000, b'a');
    request.extend_from_slice(b" HTTP/1.1\r\nHost: a\r\n\r\n");

    let out = common::send_raw(server.addr, request).await;
    assert!(out.starts_with("HTTP/1.1 414 Request-URI Too Long\r\n"), "{out}");
    assert!(out.ends_with("</html>\n"), "{out}");

    server.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_client_gets_408() {
    let mut config = common::test_config();
    config.session.receive_timeout_secs = 1;
    let server = common::start_server(config, Arc::new(Hello)).await;
    let addr = server.addr;

    let out = tokio::task::spawn_blocking(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nHost: a\r\n").unwrap();
        common::read_all(&mut stream)
    })
    .await
    .unwrap();

    assert!(out.starts_with("HTTP/1.1 408 Request Timeout\r\n"), "{out}");

    server.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn continue_is_sent_before_body_is_read() {
    let server = common::start_server(common::test_config(), Arc::new(Upload)).await;
    let addr = server.addr;

    let out = tokio::task::spawn_blocking(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        stream
            .write_all(b"PUT /f HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 7\r\n\r\n")
            .unwrap();

        let mut interim = [0u8; 25];
        stream.read_exact(&mut interim).unwrap();
        assert_eq!(&interim, b"HTTP/1.1 100 Continue\r\n\r\n");

        stream.write_all(b"payload").unwrap();
        common::read_all(&mut stream)
    })
    .await
    .unwrap();

    assert!(out.starts_with("HTTP/1.1 200 OK\r\nContent-Length: 7\r\n"), "{out}");
    assert!(out.ends_with("\r\n\r\npayload"));

    server.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_connection_does_not_block_others() {
    let server = common::start_server(common::test_config(), Arc::new(Hello)).await;

    let started = Instant::now();
    let slow = tokio::spawn(common::send_raw(server.addr, b"GET /slow HTTP/1.1\r\n\r\n".to_vec()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let fast = common::send_raw(server.addr, b"GET /fast HTTP/1.1\r\n\r\n".to_vec()).await;
    let fast_elapsed = started.elapsed();
    assert!(fast.ends_with("hi"));
    assert!(fast_elapsed < Duration::from_millis(700), "fast request waited {fast_elapsed:?}");

    let slow = slow.await.unwrap();
    assert!(slow.ends_with("hi"));

    server.shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_stops_accepting() {
    let server = common::start_server(common::test_config(), Arc::new(Hello)).await;
    let addr = server.addr;

    server.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());

    let refused = tokio::task::spawn_blocking(move || TcpStream::connect(addr).is_err())
        .await
        .unwrap();
    assert!(refused);
}

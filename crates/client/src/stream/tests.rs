use super::*;
use crate::transport::{Connection, ConnectionTransaction};
use http::{Method, StatusCode};
use indoc::indoc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use url::Url;

fn pair() -> (Connection, DuplexStream) {
    let (client, server) = duplex(64 * 1024);
    (Connection::from_io(Box::new(client), None), server)
}

fn request(method: Method, path: &str) -> Request {
    Request::new(method, Url::parse(&format!("http://stream.test{path}")).unwrap())
}

fn client_stream(tx: &mut ConnectionTransaction, request: Request) -> Stream<'_, Response, ConnectionTransaction> {
    Stream::new(Response::for_request(request), tx)
}

async fn read_string(server: &mut DuplexStream, len: usize) -> String {
    let mut buf = vec![0u8; len];
    server.read_exact(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

#[tokio::test]
async fn undeclared_body_is_chunked() {
    let (connection, mut server) = pair();
    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::POST, "/upload"));

    stream.write(b"hello").await.unwrap();
    stream.write(b"").await.unwrap();
    stream.write(b"world!").await.unwrap();
    stream.close_body().await.unwrap();
    stream.close_body().await.unwrap();
    stream.close_write().await.unwrap();
    assert_eq!(stream.bytes_written(), Some(11));

    let expected = "POST /upload HTTP/1.1\r\ntransfer-encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\nworld!\r\n0\r\n\r\n";
    assert_eq!(read_string(&mut server, expected.len()).await, expected);

    drop(stream);
    drop(tx);
    drop(connection);
    let mut rest = Vec::new();
    server.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty(), "terminator written more than once");
}

#[tokio::test]
async fn declared_length_is_written_verbatim() {
    let (connection, mut server) = pair();
    let mut tx = connection.transaction();
    let request = request(Method::PUT, "/item")
        .header(header::CONTENT_LENGTH, HeaderValue::from_static("4"));
    let mut stream = client_stream(&mut tx, request);

    stream.write(b"data").await.unwrap();
    stream.close_write().await.unwrap();
    assert!(!stream.transaction().is_writable());

    let expected = "PUT /item HTTP/1.1\r\ncontent-length: 4\r\n\r\ndata";
    assert_eq!(read_string(&mut server, expected.len()).await, expected);
}

#[tokio::test]
async fn content_length_body_leaves_next_response_buffered() {
    let (connection, mut server) = pair();
    server
        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhelloHTTP/1.1 204 No Content\r\n\r\n")
        .await
        .unwrap();

    let mut first = connection.transaction();
    let mut second = connection.transaction();
    first.start_write().await.unwrap();
    first.close_write().await.unwrap();
    second.start_write().await.unwrap();
    second.close_write().await.unwrap();

    let mut stream = client_stream(&mut first, request(Method::GET, "/a"));
    stream.start_read().await.unwrap();
    assert_eq!(stream.read_framing(), Some(PayloadSize::Length(5)));
    assert_eq!(stream.read_body().await.unwrap(), Bytes::from_static(b"hello"));
    assert!(stream.eof().await.unwrap());
    stream.close_read().await.unwrap();
    assert!(connection.is_open());

    let mut stream = client_stream(&mut second, request(Method::GET, "/b"));
    stream.start_read().await.unwrap();
    assert_eq!(stream.message().status(), StatusCode::NO_CONTENT);
    stream.close_read().await.unwrap();
    assert!(connection.is_open());
    assert_eq!(connection.in_flight(), 0);
}

#[tokio::test]
async fn pipelined_chunked_responses_are_read_in_order() {
    let (connection, mut server) = pair();
    let responses = indoc! {"
        HTTP/1.1 200 OK
        Transfer-Encoding: chunked

        5
        hello
        0

        HTTP/1.1 200 OK
        Transfer-Encoding: chunked

        3
        bye
        0
        X-Done: yes

    "};
    server.write_all(responses.replace('\n', "\r\n").as_bytes()).await.unwrap();

    let mut first = connection.transaction();
    let mut second = connection.transaction();
    first.start_write().await.unwrap();
    first.close_write().await.unwrap();
    second.start_write().await.unwrap();
    second.close_write().await.unwrap();

    let mut stream = client_stream(&mut first, request(Method::GET, "/a"));
    assert_eq!(stream.read_body().await.unwrap(), Bytes::from_static(b"hello"));
    stream.close_read().await.unwrap();
    assert!(!stream.message().headers().contains("x-done"));
    assert!(connection.is_open());

    let mut stream = client_stream(&mut second, request(Method::GET, "/b"));
    assert_eq!(stream.read_body().await.unwrap(), Bytes::from_static(b"bye"));
    stream.close_read().await.unwrap();
    assert_eq!(stream.message().headers().get_str("x-done"), "yes");
    assert!(connection.is_open());
    assert_eq!(connection.in_flight(), 0);
}

#[tokio::test]
async fn truncated_body_is_an_eof_error() {
    let (connection, mut server) = pair();
    server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc").await.unwrap();
    drop(server);

    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::GET, "/"));
    stream.start_read().await.unwrap();

    let err = stream.close_read().await.unwrap_err();
    assert!(err.is_eof(), "{err}");
    assert!(!connection.is_open());
}

#[tokio::test]
async fn truncated_chunked_body_is_an_eof_error() {
    let (connection, mut server) = pair();
    server.write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhel").await.unwrap();
    drop(server);

    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::GET, "/"));
    assert_eq!(stream.read_body().await.unwrap(), Bytes::from_static(b"hel"));

    assert!(stream.close_read().await.unwrap_err().is_eof());
    assert!(!connection.is_open());
}

#[tokio::test]
async fn truncated_head_is_an_eof_error() {
    let (connection, mut server) = pair();
    server.write_all(b"HTTP/1.1 200 OK\r\nContent-").await.unwrap();
    drop(server);

    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::GET, "/"));
    assert!(stream.start_read().await.unwrap_err().is_eof());
}

#[tokio::test]
async fn connection_close_closes_after_read() {
    let (connection, mut server) = pair();
    server.write_all(b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok").await.unwrap();

    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::GET, "/"));
    assert_eq!(stream.read_body().await.unwrap(), Bytes::from_static(b"ok"));
    stream.close_read().await.unwrap();
    assert!(!connection.is_open());
}

#[tokio::test]
async fn request_connection_close_closes_after_read() {
    let (connection, mut server) = pair();
    server.write_all(b"HTTP/1.1 204 No Content\r\n\r\n").await.unwrap();

    let mut tx = connection.transaction();
    let request = request(Method::GET, "/").header(header::CONNECTION, HeaderValue::from_static("close"));
    let mut stream = client_stream(&mut tx, request);
    stream.close_read().await.unwrap();
    assert!(!connection.is_open());
}

#[tokio::test]
async fn eof_delimited_body_closes() {
    let (connection, mut server) = pair();
    server.write_all(b"HTTP/1.0 200 OK\r\n\r\nall of it").await.unwrap();
    drop(server);

    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::GET, "/"));
    assert_eq!(stream.read_body().await.unwrap(), Bytes::from_static(b"all of it"));
    assert_eq!(stream.read_framing(), Some(PayloadSize::UntilEof));
    stream.close_read().await.unwrap();
    assert!(!connection.is_open());
}

#[tokio::test]
async fn chunked_body_with_trailers() {
    let (connection, mut server) = pair();
    let response = indoc! {"
        HTTP/1.1 200 OK
        Transfer-Encoding: chunked

        5
        hello
        7
        , world
        0
        X-Checksum: 42

    "};
    server.write_all(response.replace('\n', "\r\n").as_bytes()).await.unwrap();

    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::GET, "/"));
    assert_eq!(stream.read_body().await.unwrap(), Bytes::from_static(b"hello, world"));
    stream.close_read().await.unwrap();

    assert_eq!(stream.message().headers().get_str("x-checksum"), "42");
    assert!(connection.is_open());
}

#[tokio::test]
async fn provisional_continue_is_skipped() {
    let (connection, mut server) = pair();
    server
        .write_all(b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok")
        .await
        .unwrap();

    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::POST, "/"));
    stream.start_read().await.unwrap();
    assert_eq!(stream.message().status(), StatusCode::CREATED);
    assert_eq!(stream.read_body().await.unwrap(), Bytes::from_static(b"ok"));
}

#[tokio::test]
async fn head_response_has_no_body() {
    let (connection, mut server) = pair();
    server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n").await.unwrap();

    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::HEAD, "/"));
    assert!(stream.eof().await.unwrap());
    stream.close_read().await.unwrap();
    assert!(connection.is_open());
}

async fn aborted_after(response: &'static [u8], finish_write: bool) -> bool {
    let (connection, mut server) = pair();
    server.write_all(response).await.unwrap();

    let mut tx = connection.transaction();
    let request = request(Method::POST, "/").header(header::CONTENT_LENGTH, HeaderValue::from_static("100"));
    let mut stream = client_stream(&mut tx, request);
    stream.start_write().await.unwrap();
    if finish_write {
        stream.transaction().close_write().await.unwrap();
    }
    stream.start_read().await.unwrap();
    stream.is_aborted()
}

#[tokio::test]
async fn abort_needs_open_write_error_status_and_close() {
    const ERROR_CLOSE: &[u8] = b"HTTP/1.1 413 Payload Too Large\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";
    const ERROR_KEEP: &[u8] = b"HTTP/1.1 413 Payload Too Large\r\nContent-Length: 0\r\n\r\n";
    const OK_CLOSE: &[u8] = b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";

    assert!(aborted_after(ERROR_CLOSE, false).await);
    assert!(!aborted_after(ERROR_CLOSE, true).await);
    assert!(!aborted_after(ERROR_KEEP, false).await);
    assert!(!aborted_after(OK_CLOSE, false).await);
}

#[tokio::test]
async fn server_answers_expect_continue() {
    let (connection, mut peer) = pair();
    peer.write_all(b"PUT /x HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\n").await.unwrap();

    let mut tx = connection.transaction();
    let mut stream = Stream::new(Request::from_target(Method::GET, "/"), &mut tx);
    stream.start_read().await.unwrap();
    assert_eq!(stream.message().method(), &Method::PUT);
    assert_eq!(stream.message().target(), "/x");

    let continue_line = "HTTP/1.1 100 Continue\r\n\r\n";
    assert_eq!(read_string(&mut peer, continue_line.len()).await, continue_line);

    peer.write_all(b"data").await.unwrap();
    assert_eq!(stream.read_body().await.unwrap(), Bytes::from_static(b"data"));
    stream.close_read().await.unwrap();

    let reply = Response::new(StatusCode::OK).header(header::CONTENT_LENGTH, HeaderValue::from_static("2"));
    stream.message_mut().set_response(reply);
    stream.write(b"ok").await.unwrap();
    stream.close_write().await.unwrap();
    assert!(connection.is_open());

    let expected = "HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok";
    assert_eq!(read_string(&mut peer, expected.len()).await, expected);
}

#[tokio::test]
async fn server_closes_for_http10_without_keep_alive() {
    let (connection, mut peer) = pair();
    peer.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();

    let mut tx = connection.transaction();
    let mut stream = Stream::new(Request::from_target(Method::GET, "/"), &mut tx);
    stream.start_read().await.unwrap();
    stream.close_read().await.unwrap();

    let mut reply = Response::new(StatusCode::OK).with_body("hi");
    reply.set_version(Version::HTTP_10);
    stream.message_mut().set_response(reply);
    stream.write(b"hi").await.unwrap();
    stream.close_write().await.unwrap();
    assert!(!connection.is_open());

    let mut written = String::new();
    peer.read_to_string(&mut written).await.unwrap();
    assert_eq!(written, "HTTP/1.0 200 OK\r\n\r\nhi");
}

async fn serve_once(request: &[u8], reply: Response) -> Connection {
    let (connection, mut peer) = pair();
    peer.write_all(request).await.unwrap();

    let mut tx = connection.transaction();
    let mut stream = Stream::new(Request::from_target(Method::GET, "/"), &mut tx);
    stream.start_read().await.unwrap();
    stream.close_read().await.unwrap();

    stream.message_mut().set_response(reply);
    stream.write(b"ok").await.unwrap();
    stream.close_write().await.unwrap();
    drop(stream);
    drop(tx);
    connection
}

#[tokio::test]
async fn server_closes_when_either_side_asks() {
    let ok = || Response::new(StatusCode::OK).header(header::CONTENT_LENGTH, HeaderValue::from_static("2"));

    let connection = serve_once(b"GET / HTTP/1.1\r\n\r\n", ok()).await;
    assert!(connection.is_open());

    let connection = serve_once(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n", ok()).await;
    assert!(!connection.is_open());

    let closing = ok().header(header::CONNECTION, HeaderValue::from_static("close"));
    let connection = serve_once(b"GET / HTTP/1.1\r\n\r\n", closing).await;
    assert!(!connection.is_open());

    let connection = serve_once(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n", ok()).await;
    assert!(connection.is_open());
}

#[tokio::test]
async fn server_close_write_needs_open_write_side() {
    let (connection, _peer) = pair();
    let mut tx = connection.transaction();
    let mut stream = Stream::new(Request::from_target(Method::GET, "/"), &mut tx);

    assert!(matches!(stream.close_write().await, Err(HttpError::InvalidState(_))));
}

#[tokio::test]
async fn server_close_read_of_unread_request_closes() {
    let (connection, mut peer) = pair();
    peer.write_all(b"POST / HTTP/1.1\r\nContent-Length: 8\r\n\r\nabc").await.unwrap();

    let mut tx = connection.transaction();
    let mut stream = Stream::new(Request::from_target(Method::GET, "/"), &mut tx);
    stream.start_read().await.unwrap();

    assert!(stream.close_read().await.unwrap_err().is_eof());
    assert!(!connection.is_open());
}

#[tokio::test]
async fn read_before_head_is_invalid_state() {
    let (connection, _peer) = pair();
    let mut tx = connection.transaction();
    let mut stream = client_stream(&mut tx, request(Method::GET, "/"));

    assert!(matches!(stream.read_available().await, Err(HttpError::InvalidState(_))));
}

//! Command execution against an in-memory server.

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use redlink::{Connection, ConnectionState, Error, Value};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use support::read_command;

fn bulk(s: &str) -> Value {
    Value::Bulk(Bytes::from(s.to_string()))
}

#[tokio::test]
async fn test_execute_collects_array_reply() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("LRANGE FOO 0 -1").await }
    });

    assert_eq!(read_command(&mut server).await, "LRANGE FOO 0 -1");
    server
        .write_all(b"*3\r\n$1\r\n5\r\n$1\r\n4\r\n$1\r\n3\r\n")
        .await
        .unwrap();

    let values = pending.await.unwrap().unwrap();
    assert_eq!(values, vec![bulk("5"), bulk("4"), bulk("3")]);
    assert_eq!(conn.state(), ConnectionState::Open);
}

#[tokio::test]
async fn test_reply_split_across_many_writes() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("GET big").await }
    });

    assert_eq!(read_command(&mut server).await, "GET big");
    for byte in b"*2\r\n$11\r\nhello world\r\n$-1\r\n" {
        server.write_all(&[*byte]).await.unwrap();
        tokio::task::yield_now().await;
    }

    let values = pending.await.unwrap().unwrap();
    assert_eq!(values, vec![bulk("hello world"), Value::Nil]);
}

#[tokio::test]
async fn test_second_command_waits_for_first_reply() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let first = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("GET first").await }
    });
    assert_eq!(read_command(&mut server).await, "GET first");

    let second = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("GET second").await }
    });

    // Nothing else may reach the wire while the first reply is outstanding.
    let mut byte = [0u8; 1];
    assert!(timeout(Duration::from_millis(50), server.read(&mut byte))
        .await
        .is_err());
    assert!(conn.is_busy());

    server.write_all(b"$5\r\nfirst\r\n").await.unwrap();
    assert_eq!(read_command(&mut server).await, "GET second");
    server.write_all(b"$6\r\nsecond\r\n").await.unwrap();

    assert_eq!(first.await.unwrap().unwrap(), vec![bulk("first")]);
    assert_eq!(second.await.unwrap().unwrap(), vec![bulk("second")]);
    assert!(!conn.is_busy());
}

#[tokio::test]
async fn test_concurrent_callers_each_get_their_own_reply() {
    let (client, server) = duplex(4096);
    let conn = Connection::from_stream(client);

    let server = tokio::spawn(async move {
        let mut server = BufReader::new(server);
        for _ in 0..20 {
            let line = read_command(&mut server).await;
            let arg = line.trim_start_matches("ECHO ");
            let reply = format!("${}\r\n{}\r\n", arg.len(), arg);
            server.write_all(reply.as_bytes()).await.unwrap();
        }
    });

    let mut handles = Vec::new();
    for i in 0..20 {
        let conn = conn.clone();
        handles.push(tokio::spawn(async move {
            let values = conn.execute(&format!("ECHO msg{}", i)).await.unwrap();
            assert_eq!(values, vec![bulk(&format!("msg{}", i))]);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_batch_collects_one_reply_per_line() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("MULTI\n    LPUSH FOO 1\nEXEC").await }
    });

    assert_eq!(read_command(&mut server).await, "MULTI");
    assert_eq!(read_command(&mut server).await, "    LPUSH FOO 1");
    assert_eq!(read_command(&mut server).await, "EXEC");
    server
        .write_all(b"+OK\r\n+QUEUED\r\n*1\r\n:1\r\n")
        .await
        .unwrap();

    let values = pending.await.unwrap().unwrap();
    assert_eq!(
        values,
        vec![
            Value::Status("OK".into()),
            Value::Status("QUEUED".into()),
            Value::Integer(1),
        ]
    );
}

#[tokio::test]
async fn test_server_error_reply_is_a_value() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("INCR text").await }
    });
    read_command(&mut server).await;
    server
        .write_all(b"-ERR value is not an integer\r\n")
        .await
        .unwrap();

    let values = pending.await.unwrap().unwrap();
    assert_eq!(
        values,
        vec![Value::Error("ERR value is not an integer".into())]
    );
    assert!(conn.is_open());
}

#[tokio::test]
async fn test_close_while_suspended_rejects_pending_command() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("BLPOP queue 0").await }
    });
    assert_eq!(read_command(&mut server).await, "BLPOP queue 0");
    assert!(conn.is_busy());

    let queued = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("PING").await }
    });
    tokio::task::yield_now().await;

    conn.close();

    let result = timeout(Duration::from_secs(1), pending)
        .await
        .expect("pending command hung after close")
        .unwrap();
    assert!(matches!(result, Err(Error::Closed)));

    let result = timeout(Duration::from_secs(1), queued)
        .await
        .expect("queued command hung after close")
        .unwrap();
    assert!(matches!(result, Err(Error::Closed)));

    assert!(conn.is_closed());

    // The transport was released and nothing else was written.
    let mut rest = Vec::new();
    server.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_execute_on_closed_connection_writes_nothing() {
    let (client, mut server) = duplex(1024);
    let conn = Connection::from_stream(client);
    conn.close();

    assert!(matches!(conn.execute("PING").await, Err(Error::Closed)));
    assert!(matches!(conn.emit("PING", |_| {}), Err(Error::Closed)));

    let mut written = Vec::new();
    server.read_to_end(&mut written).await.unwrap();
    assert!(written.is_empty());
}

#[tokio::test]
async fn test_server_hangup_closes_connection() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("GET k").await }
    });
    read_command(&mut server).await;
    server.write_all(b"$10\r\ntrunc").await.unwrap();
    drop(server);

    assert!(matches!(pending.await.unwrap(), Err(Error::Closed)));
    assert!(conn.is_closed());
    assert!(matches!(conn.execute("GET k").await, Err(Error::Closed)));
}

#[tokio::test]
async fn test_protocol_error_leaves_connection_usable() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("GET k").await }
    });
    read_command(&mut server).await;
    server.write_all(b"!oops\r\n").await.unwrap();

    assert!(matches!(
        pending.await.unwrap(),
        Err(Error::Protocol { .. })
    ));
    assert_eq!(conn.state(), ConnectionState::Open);

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("PING").await }
    });
    assert_eq!(read_command(&mut server).await, "PING");
    server.write_all(b"+PONG\r\n").await.unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        vec![Value::Status("PONG".into())]
    );
}

#[tokio::test]
async fn test_leftover_bytes_of_bad_reply_are_discarded() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("GET k").await }
    });
    read_command(&mut server).await;
    server.write_all(b"!oops\r\n+TAIL\r\n").await.unwrap();
    assert!(matches!(
        pending.await.unwrap(),
        Err(Error::Protocol { .. })
    ));

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.execute("PING").await }
    });
    assert_eq!(read_command(&mut server).await, "PING");
    server.write_all(b"+PONG\r\n").await.unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap(),
        vec![Value::Status("PONG".into())]
    );
    assert_eq!(conn.state(), ConnectionState::Open);
}

#[tokio::test]
async fn test_cancelled_execute_closes_connection() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let result = timeout(Duration::from_millis(20), conn.execute("GET slow")).await;
    assert!(result.is_err());
    assert_eq!(read_command(&mut server).await, "GET slow");

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(conn.is_closed());
    assert!(!conn.is_open());

    let other = conn.clone();
    assert!(matches!(other.execute("PING").await, Err(Error::Closed)));

    // The transport was released with nothing else written.
    let mut rest = Vec::new();
    server.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_aborted_emit_closes_connection() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let handle = conn.emit("BLPOP queue 0", |_| {}).unwrap();
    assert_eq!(read_command(&mut server).await, "BLPOP queue 0");
    assert!(conn.is_busy());

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    assert!(conn.is_closed());
    assert!(matches!(conn.execute("PING").await, Err(Error::Closed)));
}

#[tokio::test]
async fn test_emit_streams_values_to_sink() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);
    let mut server = BufReader::new(server);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handle = conn
        .emit("LRANGE FOO 0 -1", {
            let seen = seen.clone();
            move |value| seen.lock().unwrap().push(value)
        })
        .unwrap();

    assert_eq!(read_command(&mut server).await, "LRANGE FOO 0 -1");
    server
        .write_all(b"*3\r\n$1\r\na\r\n*0\r\n$1\r\nb\r\n")
        .await
        .unwrap();

    handle.await.unwrap().unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![bulk("a"), bulk("b")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_execute_blocking_from_blocking_thread() {
    let (client, server) = duplex(1024);
    let conn = Connection::from_stream(client);

    let server = tokio::spawn(async move {
        let mut server = BufReader::new(server);
        assert_eq!(read_command(&mut server).await, "PING");
        server.write_all(b"+PONG\r\n").await.unwrap();
        server
    });

    let values = tokio::task::spawn_blocking(move || conn.execute_blocking("PING"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(values, vec![Value::Status("PONG".into())]);
    drop(server.await.unwrap());
}

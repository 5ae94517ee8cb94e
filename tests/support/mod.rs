#![allow(dead_code)]

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Reads one command line as the server sees it, without its terminator.
pub async fn read_command<S: AsyncRead + Unpin>(reader: &mut BufReader<S>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    line.trim_end_matches(|c| c == '\r' || c == '\n').to_string()
}

/// Accepts a single client and answers each expected command line with the
/// scripted reply bytes.
pub async fn scripted_server(
    script: Vec<(&'static str, &'static str)>,
) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut socket = BufReader::new(socket);
        for (expected, reply) in script {
            assert_eq!(read_command(&mut socket).await, expected);
            socket.write_all(reply.as_bytes()).await.unwrap();
        }
    });

    (addr, handle)
}

//! Shared helpers for TCP level tests

#![allow(dead_code)]

use gossipd_core::*;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.name = "irc.test".to_string();
    config.server.motd = vec!["Welcome to the test network".to_string()];
    config
}

/// Start a server on an ephemeral port
pub async fn start_server(config: Config) -> (Server, SocketAddr) {
    let server = Server::new(config).unwrap();
    let listener = server.bind_to("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let runner = server.clone();
    tokio::spawn(async move { runner.serve(listener).await });
    (server, addr)
}

pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// Connect and complete registration, consuming everything up to the end of the MOTD
    pub async fn register(addr: SocketAddr, nick: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(&format!("NICK {}", nick)).await;
        client.send(&format!("USER {} 0 * :Test User", nick)).await;
        client
            .expect(|line| line.contains(" 376 ") || line.contains(" 422 "))
            .await;
        client
    }

    pub async fn send(&mut self, line: &str) {
        self.send_raw(format!("{}\r\n", line).as_bytes()).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Next line, or `None` on EOF
    pub async fn try_recv(&mut self) -> Option<String> {
        let mut line = String::new();
        let read = timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap_or(0);
        if read == 0 {
            return None;
        }
        Some(line.trim_end().to_string())
    }

    /// Next line; panics on EOF
    pub async fn recv(&mut self) -> String {
        self.try_recv().await.expect("connection closed")
    }

    /// Skip lines until one matches
    pub async fn expect<F>(&mut self, matches: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        loop {
            let line = self.recv().await;
            if matches(&line) {
                return line;
            }
        }
    }

    /// Round-trip a PING so everything the server queued before it has arrived.
    /// Returns the lines received ahead of the PONG.
    pub async fn sync(&mut self) -> Vec<String> {
        self.send("PING sync").await;
        let mut before = Vec::new();
        loop {
            let line = self.recv().await;
            if line.ends_with("PONG irc.test sync") {
                return before;
            }
            before.push(line);
        }
    }

    /// Wait for the server to close the connection, returning what came before
    pub async fn until_closed(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.try_recv().await {
            lines.push(line);
        }
        lines
    }
}

/// Numeric code or verb of a server line
pub fn command_of(line: &str) -> &str {
    line.split(' ').nth(1).unwrap_or_default()
}

//! Test chat client.
//!
//! Connects to a channel port, sends the username, and reads the server's
//! newline-terminated lines.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A test chat client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect to a channel and identify as `username`.
    pub async fn connect(port: u16, username: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(("127.0.0.1", port)).await?;
        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        };
        client.send(username).await?;
        Ok(client)
    }

    /// Connect and wait for the welcome line.
    pub async fn join(port: u16, username: &str) -> anyhow::Result<Self> {
        let mut client = Self::connect(port, username).await?;
        client.expect("Welcome to the").await?;
        Ok(client)
    }

    /// Send one line.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive a single line.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a line with a timeout. EOF is an error.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(line.trim_end_matches('\n').to_string())
    }

    /// Receive lines until `predicate` matches, returning all of them.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = predicate(&line);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Receive lines until one contains `needle`, returning that line.
    pub async fn expect(&mut self, needle: &str) -> anyhow::Result<String> {
        let mut lines = self.recv_until(|line| line.contains(needle)).await?;
        lines
            .pop()
            .ok_or_else(|| anyhow::anyhow!("no line containing {needle:?}"))
    }

    /// Receive lines until every needle has appeared, in any order.
    pub async fn expect_all(&mut self, needles: &[&str]) -> anyhow::Result<Vec<String>> {
        let mut missing: Vec<&str> = needles.to_vec();
        let mut lines = Vec::new();
        while !missing.is_empty() {
            let line = self.recv().await?;
            missing.retain(|needle| !line.contains(needle));
            lines.push(line);
        }
        Ok(lines)
    }

    /// Read until the server closes the connection, returning what arrived.
    pub async fn expect_closed(&mut self) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
            if n == 0 {
                return Ok(lines);
            }
            lines.push(line.trim_end_matches('\n').to_string());
        }
    }

    /// Discard whatever arrives within a short quiet period.
    pub async fn drain(&mut self) {
        while self.recv_timeout(Duration::from_millis(150)).await.is_ok() {}
    }
}

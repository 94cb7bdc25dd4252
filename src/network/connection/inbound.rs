//! Chunked reader turning raw socket reads into logical messages.
//!
//! Each read takes at most `chunk_size` bytes. A chunk is split on `\n`;
//! every piece is trimmed and empty pieces are dropped. Pieces queue up in
//! `pending` until the session asks for them.

use std::collections::VecDeque;
use std::io;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;

/// Upper bound on buffered messages while a session is not consuming them.
const MAX_PENDING: usize = 64;

pub struct Inbound {
    reader: OwnedReadHalf,
    buf: Vec<u8>,
    pending: VecDeque<String>,
}

impl Inbound {
    pub fn new(reader: OwnedReadHalf, chunk_size: usize) -> Self {
        Self {
            reader,
            buf: vec![0; chunk_size],
            pending: VecDeque::new(),
        }
    }

    /// Next logical message, reading from the socket as needed.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    /// Cancel-safe: a completed read is split before the next await.
    pub async fn next_message(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(Some(message));
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }
    }

    /// Read one chunk into the pending queue. `Ok(false)` on EOF.
    pub async fn fill(&mut self) -> io::Result<bool> {
        let n = self.reader.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(false);
        }
        self.pending.extend(split_chunk(&self.buf[..n]));
        Ok(true)
    }

    /// Whether more input may be buffered without being consumed.
    pub fn has_room(&self) -> bool {
        self.pending.len() < MAX_PENDING
    }
}

/// Split one read chunk into trimmed, non-empty messages.
fn split_chunk(chunk: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(chunk)
        .split('\n')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

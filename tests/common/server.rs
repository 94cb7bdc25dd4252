//! Test server management.
//!
//! Spawns channeld instances with a temporary channel file and settings,
//! a piped stdin for operator commands, and a captured console transcript.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};

/// One `channel <name> <port> <capacity>` line.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSpec {
    pub name: &'static str,
    pub port: u16,
    pub capacity: usize,
}

impl ChannelSpec {
    pub const fn new(name: &'static str, port: u16, capacity: usize) -> Self {
        Self {
            name,
            port,
            capacity,
        }
    }
}

/// A running channeld process.
pub struct TestServer {
    child: Child,
    stdin: Option<ChildStdin>,
    console: mpsc::UnboundedReceiver<String>,
    _dir: TempDir,
}

impl TestServer {
    /// Spawn a server with the default test idle timeout.
    pub async fn spawn(channels: &[ChannelSpec]) -> anyhow::Result<Self> {
        Self::spawn_with_idle(channels, 30).await
    }

    /// Spawn a server whose sessions go AFK after `idle_secs`.
    pub async fn spawn_with_idle(channels: &[ChannelSpec], idle_secs: u64) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;

        let channel_path = dir.path().join("channels.conf");
        let mut channel_file = String::new();
        for spec in channels {
            channel_file.push_str(&format!(
                "channel {} {} {}\n",
                spec.name, spec.port, spec.capacity
            ));
        }
        std::fs::write(&channel_path, channel_file)?;

        let settings_path = dir.path().join("settings.toml");
        std::fs::write(
            &settings_path,
            format!(
                r#"
[server]
idle_timeout_secs = {idle_secs}
queue_poll_interval_ms = 200
shutdown_grace_ms = 500

[channels]
allow_unprivileged_ports = true
"#
            ),
        )?;

        let mut child = Command::new(env!("CARGO_BIN_EXE_channeld"))
            .arg(&channel_path)
            .arg(&settings_path)
            .env("RUST_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("stdout not captured"))?;

        // Drain stdout on a thread so the server never blocks on a full pipe.
        let (tx, console) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut server = Self {
            child,
            stdin,
            console,
            _dir: dir,
        };
        server.wait_until_ready(channels.len()).await?;
        Ok(server)
    }

    /// Wait until every channel has announced its listener.
    async fn wait_until_ready(&mut self, channels: usize) -> anyhow::Result<()> {
        for _ in 0..channels {
            self.console_until("started on port").await?;
        }
        Ok(())
    }

    /// Send one line to the operator console.
    pub fn admin(&mut self, line: &str) -> anyhow::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("console closed"))?;
        writeln!(stdin, "{line}")?;
        stdin.flush()?;
        Ok(())
    }

    /// Read console output until a line contains `needle`.
    pub async fn console_until(&mut self, needle: &str) -> anyhow::Result<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.console.recv()).await {
                Ok(Some(line)) if line.contains(needle) => return Ok(line),
                Ok(Some(_)) => continue,
                Ok(None) => anyhow::bail!("console closed while waiting for {needle:?}"),
                Err(_) => anyhow::bail!("timed out waiting for console line {needle:?}"),
            }
        }
    }

    /// Wait for the process to exit on its own.
    pub async fn wait_exit(&mut self, within: Duration) -> anyhow::Result<ExitStatus> {
        let deadline = Instant::now() + within;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                anyhow::bail!("server did not exit within {within:?}");
            }
            sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

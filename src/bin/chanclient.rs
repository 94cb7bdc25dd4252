//! chanclient - minimal line client for channeld.
//!
//! Connects to a channel on localhost, sends the username, then relays
//! stdin lines to the server and prints whatever the server sends back.

use anyhow::Context;
use futures_util::StreamExt;
use std::process::ExitCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, LinesCodec};

const USAGE: &str = "usage: chanclient <port> <username>";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [port, username] = args.as_slice() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let port = match port.parse::<u16>() {
        Ok(port) if port != 0 => port,
        _ => {
            eprintln!("invalid port: {port}");
            return ExitCode::FAILURE;
        }
    };

    let code = match run(port, username).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("chanclient: {e:#}");
            1
        }
    };
    // A pending stdin read would otherwise hold the runtime open.
    std::process::exit(code);
}

async fn run(port: u16, username: &str) -> anyhow::Result<()> {
    let stream = TcpStream::connect(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to connect to port {port}"))?;
    let (mut reader, mut writer) = stream.into_split();

    writer.write_all(format!("{username}\n").as_bytes()).await?;

    // Server output is printed chunk by chunk; the server ends the session.
    let printer = tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        let mut stdout = tokio::io::stdout();
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if stdout.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
            }
        }
    });

    let mut input = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    let relay = async {
        while let Some(line) = input.next().await {
            let line = line.context("failed to read stdin")?;
            writer.write_all(format!("{line}\n").as_bytes()).await?;
        }
        anyhow::Ok(())
    };

    tokio::select! {
        _ = printer => Ok(()),
        result = relay => result,
    }
}

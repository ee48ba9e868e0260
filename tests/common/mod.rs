#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use smtp_auth_honeypot::error::SessionError;
use smtp_auth_honeypot::{CredentialAttempt, DenyAll, EventSink, SmtpConfig, SmtpHoneypot};

pub fn test_config() -> SmtpConfig {
    SmtpConfig {
        hostname: "mx.test".to_string(),
        banner: "Test".to_string(),
        max_line_length: 1024,
        idle_timeout: Duration::from_secs(15),
        ..Default::default()
    }
}

pub fn honeypot(config: SmtpConfig) -> (Arc<SmtpHoneypot>, mpsc::Receiver<CredentialAttempt>) {
    let (sink, rx) = EventSink::channel(64);
    let honeypot = SmtpHoneypot::new(config, Arc::new(DenyAll), sink).unwrap();
    (Arc::new(honeypot), rx)
}

/// Minimal line-oriented SMTP client, in the spirit of smtplib's `docmd`.
pub struct Client<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite> Client<S> {
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\r\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Reads one (possibly multi-line) reply. `None` on EOF.
    pub async fn reply(&mut self) -> Option<(u16, Vec<String>)> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await.unwrap() == 0 {
                return None;
            }
            let line = line.trim_end_matches(&['\r', '\n'][..]).to_string();
            let code: u16 = line[..3].parse().unwrap();
            let last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line.get(4..).unwrap_or("").to_string());
            if last {
                return Some((code, lines));
            }
        }
    }

    pub async fn docmd(&mut self, line: &str) -> (u16, Vec<String>) {
        self.send(line).await;
        self.reply().await.expect("server closed the connection")
    }
}

pub fn peer() -> SocketAddr {
    "192.0.2.10:40000".parse().unwrap()
}

/// Connects a client to a freshly spawned session over an in-memory pipe.
pub async fn connect(
    honeypot: &Arc<SmtpHoneypot>,
) -> (
    Client<tokio::io::DuplexStream>,
    JoinHandle<Result<(), SessionError>>,
) {
    let (client, server) = tokio::io::duplex(16 * 1024);
    let this = honeypot.clone();
    let handle = tokio::spawn(async move { this.handle_stream(server, peer()).await });
    let mut client = Client::new(client);
    let (code, _) = client.reply().await.unwrap();
    assert_eq!(code, 220);
    (client, handle)
}

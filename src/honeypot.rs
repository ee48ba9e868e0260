use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::time;

use crate::auth::Authenticator;
use crate::capture::EventSink;
use crate::config::SmtpConfig;
use crate::error::SessionError;
use crate::line::{LineReader, LineWriter};
use crate::machine::Engine;
use crate::reply::Reply;
use crate::session::SmtpSession;
use crate::utils::safe_log_string;

pub struct SmtpHoneypot {
    pub config: Arc<SmtpConfig>,
    engine: Engine,
    sink: EventSink,
}

impl SmtpHoneypot {
    pub fn new(
        config: SmtpConfig,
        authenticator: Arc<dyn Authenticator>,
        sink: EventSink,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            engine: Engine::new(config.clone(), authenticator),
            config,
            sink,
        })
    }

    /// Runs one SMTP session over any byte stream until QUIT, EOF or a fatal error.
    pub async fn handle_stream<S>(&self, stream: S, client_addr: SocketAddr) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite,
    {
        let (reader, writer) = tokio::io::split(stream);
        let mut reader = LineReader::new(reader, self.config.max_line_length);
        let mut writer = LineWriter::new(writer);
        let mut session = SmtpSession::new(client_addr);

        if !self.config.banner_delay.is_zero() {
            time::sleep(self.config.banner_delay).await;
        }
        writer.write_reply(&self.engine.greet(&mut session)).await?;

        let result = self.dialogue(&mut reader, &mut writer, &mut session).await;

        match &result {
            Ok(()) => self.abandon(&mut session, "disconnected"),
            Err(SessionError::LineTooLong { limit }) => {
                tracing::warn!(peer = %client_addr, limit, "line too long, closing");
                // The fragment itself never reaches the attempt.
                self.abandon(&mut session, "line too long");
                let _ = writer.write_reply(&Reply::new(500, "5.5.2 Line too long")).await;
            }
            Err(SessionError::Timeout) => {
                self.abandon(&mut session, "idle timeout");
                let timeout = Reply::new(421, format!("4.4.2 {} Timeout", self.config.hostname));
                let _ = writer.write_reply(&timeout).await;
            }
            Err(SessionError::Stream(e)) => {
                tracing::debug!(peer = %client_addr, error = %e, "stream error");
                self.abandon(&mut session, "stream error");
            }
        }

        session.close();
        let _ = writer.shutdown().await;
        result
    }

    async fn dialogue<R, W>(
        &self,
        reader: &mut LineReader<R>,
        writer: &mut LineWriter<W>,
        session: &mut SmtpSession,
    ) -> Result<(), SessionError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let peer = session.client_addr;
        loop {
            let line = match time::timeout(self.config.idle_timeout, reader.read_line()).await {
                Ok(line) => line?,
                Err(_) => return Err(SessionError::Timeout),
            };
            let line = match line {
                Some(line) => line,
                None => return Ok(()),
            };
            tracing::debug!(peer = %peer, ">> {}", safe_log_string(&String::from_utf8_lossy(&line)));

            let transition = self.engine.handle_line(session, &line);

            let denied = transition.is_denial();

            // The attempt is queued before the client learns the outcome.
            if let Some(attempt) = transition.attempt {
                self.sink.emit(attempt);
            }
            if denied && !self.config.auth_delay.is_zero() {
                time::sleep(self.config.auth_delay).await;
            }
            for reply in &transition.replies {
                tracing::debug!(peer = %peer, "<< {}", reply);
                writer.write_reply(reply).await?;
            }
            if transition.close {
                return Ok(());
            }
        }
    }

    fn abandon(&self, session: &mut SmtpSession, reason: &str) {
        if let Some(attempt) = session.abandon(reason) {
            self.sink.emit(attempt);
        }
    }

    /// Accepts connections forever, one task per client.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, client_addr)) => {
                    let this = self.clone();
                    tokio::spawn(async move {
                        tracing::info!(peer = %client_addr, "new connection");
                        if let Err(e) = this.handle_stream(stream, client_addr).await {
                            tracing::info!(peer = %client_addr, error = %e, "session aborted");
                        }
                        tracing::info!(peer = %client_addr, "connection closed");
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                }
            }
        }
    }

    async fn run_server(self: Arc<Self>, port: u16) -> Result<()> {
        let addr = format!("{}:{}", self.config.address, port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        tracing::info!(%addr, "listening");
        self.serve(listener).await
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("SMTP capability disabled, not listening");
            return Ok(());
        }

        let mut handles = vec![];
        for port in self.config.ports.clone() {
            let this = self.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = this.run_server(port).await {
                    tracing::error!(port, error = %e, "server failed");
                }
            }));
        }

        for handle in handles {
            handle.await?;
        }
        Ok(())
    }
}

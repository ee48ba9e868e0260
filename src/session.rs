use std::fmt;
use std::net::SocketAddr;

use chrono::Utc;

use crate::auth::{CredentialAttempt, Identity, Mechanism, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Greeting,
    Ready,
    AwaitingAuthMechanism,
    AwaitingCramResponse,
    AwaitingPlainResponse,
    AwaitingLoginUser,
    AwaitingLoginPassword,
    Closed,
}

impl Phase {
    /// Mechanism whose dialogue owns this phase, if any.
    pub fn mechanism(self) -> Option<Mechanism> {
        match self {
            Phase::AwaitingCramResponse => Some(Mechanism::CramMd5),
            Phase::AwaitingPlainResponse => Some(Mechanism::Plain),
            Phase::AwaitingLoginUser | Phase::AwaitingLoginPassword => Some(Mechanism::Login),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-connection state, owned by the connection's task.
pub struct SmtpSession {
    pub client_addr: SocketAddr,
    pub helo: Option<String>,
    phase: Phase,
    pending_challenge: Option<Vec<u8>>,
    pending_username: Option<String>,
}

impl SmtpSession {
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            client_addr,
            helo: None,
            phase: Phase::Greeting,
            pending_challenge: None,
            pending_username: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pending_challenge(&self) -> Option<&[u8]> {
        self.pending_challenge.as_deref()
    }

    pub fn pending_username(&self) -> Option<&str> {
        self.pending_username.as_deref()
    }

    /// Moves to `phase`, dropping any pending material the new phase does not own.
    pub fn enter(&mut self, phase: Phase) {
        if phase != Phase::AwaitingCramResponse {
            self.pending_challenge = None;
        }
        if phase != Phase::AwaitingLoginPassword {
            self.pending_username = None;
        }
        self.phase = phase;
    }

    pub fn await_cram_response(&mut self, challenge: Vec<u8>) {
        self.enter(Phase::AwaitingCramResponse);
        self.pending_challenge = Some(challenge);
    }

    pub fn await_login_password(&mut self, username: String) {
        self.enter(Phase::AwaitingLoginPassword);
        self.pending_username = Some(username);
    }

    pub fn attempt(
        &self,
        mechanism: Mechanism,
        identity: Identity,
        secret: String,
        verdict: Verdict,
    ) -> CredentialAttempt {
        CredentialAttempt {
            timestamp: Utc::now(),
            peer: self.client_addr,
            client_hostname: self.helo.clone(),
            mechanism,
            identity,
            secret,
            verdict,
            abandoned: false,
            detail: None,
        }
    }

    /// Closes any open mechanism dialogue, returning the partial attempt it held.
    pub fn abandon(&mut self, detail: &str) -> Option<CredentialAttempt> {
        let mechanism = self.phase.mechanism()?;
        let identity = Identity::user(self.pending_username.clone().unwrap_or_default());
        let mut attempt = self.attempt(mechanism, identity, String::new(), Verdict::Denied);
        attempt.abandoned = true;
        attempt.detail = Some(detail.to_string());
        self.enter(Phase::Ready);
        Some(attempt)
    }

    pub fn close(&mut self) {
        self.enter(Phase::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SmtpSession {
        SmtpSession::new("192.0.2.7:4242".parse().unwrap())
    }

    #[test]
    fn starts_in_greeting() {
        let s = session();
        assert_eq!(s.phase(), Phase::Greeting);
        assert!(s.pending_challenge().is_none());
        assert!(s.pending_username().is_none());
    }

    #[test]
    fn pending_material_cleared_on_exit() {
        let mut s = session();
        s.await_cram_response(b"<1.2@x>".to_vec());
        assert_eq!(s.pending_challenge(), Some(&b"<1.2@x>"[..]));
        s.enter(Phase::Ready);
        assert!(s.pending_challenge().is_none());

        s.await_login_password("bob".into());
        assert_eq!(s.pending_username(), Some("bob"));
        s.close();
        assert!(s.pending_username().is_none());
        assert_eq!(s.phase(), Phase::Closed);
    }

    #[test]
    fn abandon_keeps_login_username() {
        let mut s = session();
        s.helo = Some("client.example".into());
        s.await_login_password("admin".into());
        let attempt = s.abandon("disconnected").unwrap();
        assert_eq!(attempt.mechanism, Mechanism::Login);
        assert_eq!(attempt.identity.username, "admin");
        assert!(attempt.abandoned);
        assert_eq!(attempt.client_hostname.as_deref(), Some("client.example"));
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[test]
    fn abandon_outside_mechanism_is_noop() {
        let mut s = session();
        s.enter(Phase::Ready);
        assert!(s.abandon("disconnected").is_none());
    }
}

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};

/// SASL mechanisms advertised and spoken by the honeypot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    Plain,
    Login,
    CramMd5,
}

pub struct MechanismDescriptor {
    pub mechanism: Mechanism,
    pub name: &'static str,
    /// Server prompts needed before the client's final response, without initial response.
    pub round_trips: usize,
    /// Whether the server must send a generated challenge first.
    pub challenge: bool,
    /// Whether `AUTH <name> <initial-response>` is allowed.
    pub initial_response: bool,
}

pub static MECHANISMS: [MechanismDescriptor; 3] = [
    MechanismDescriptor {
        mechanism: Mechanism::Plain,
        name: "PLAIN",
        round_trips: 1,
        challenge: false,
        initial_response: true,
    },
    MechanismDescriptor {
        mechanism: Mechanism::Login,
        name: "LOGIN",
        round_trips: 2,
        challenge: false,
        initial_response: true,
    },
    MechanismDescriptor {
        mechanism: Mechanism::CramMd5,
        name: "CRAM-MD5",
        round_trips: 1,
        challenge: true,
        initial_response: false,
    },
];

impl Mechanism {
    pub fn descriptor(self) -> &'static MechanismDescriptor {
        match self {
            Mechanism::Plain => &MECHANISMS[0],
            Mechanism::Login => &MECHANISMS[1],
            Mechanism::CramMd5 => &MECHANISMS[2],
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Space separated list for the EHLO `AUTH` capability.
    pub fn advertised() -> String {
        MECHANISMS
            .iter()
            .map(|d| d.name)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mechanism {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MECHANISMS
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(s))
            .map(|d| d.mechanism)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Only PLAIN carries an authorization identity.
    pub authzid: Option<String>,
    pub username: String,
}

impl Identity {
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            authzid: None,
            username: username.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.authzid {
            Some(authzid) if !authzid.is_empty() => write!(f, "{}/{}", authzid, self.username),
            _ => f.write_str(&self.username),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Denied,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accepted => f.write_str("accepted"),
            Verdict::Denied => f.write_str("denied"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    /// Opaque to the client; only ever reaches the capture log.
    pub reason: &'static str,
}

/// Credential policy. Must not depend on session state.
pub trait Authenticator: Send + Sync {
    fn evaluate(&self, mechanism: Mechanism, identity: &Identity, secret: &str) -> Decision;
}

/// The honeypot policy: nobody gets in, and nothing about the input changes how long that takes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl Authenticator for DenyAll {
    fn evaluate(&self, _mechanism: Mechanism, _identity: &Identity, _secret: &str) -> Decision {
        Decision {
            verdict: Verdict::Denied,
            reason: "deny-all",
        }
    }
}

/// One captured authentication round.
#[derive(Debug, Clone)]
pub struct CredentialAttempt {
    pub timestamp: DateTime<Utc>,
    pub peer: SocketAddr,
    pub client_hostname: Option<String>,
    pub mechanism: Mechanism,
    pub identity: Identity,
    /// Password, or the hex digest for CRAM-MD5.
    pub secret: String,
    pub verdict: Verdict,
    /// Client went away or cancelled before the last step.
    pub abandoned: bool,
    pub detail: Option<String>,
}

//! SMTP honeypot engine: speaks enough ESMTP to get clients to authenticate,
//! records every PLAIN, LOGIN and CRAM-MD5 attempt and denies them all.

pub mod auth;
pub mod capture;
pub mod codec;
pub mod command;
pub mod config;
pub mod daemon;
pub mod error;
pub mod honeypot;
pub mod line;
pub mod machine;
pub mod reply;
pub mod session;
pub mod utils;

pub use auth::{Authenticator, CredentialAttempt, DenyAll, Mechanism, Verdict};
pub use capture::{CaptureLog, EventSink};
pub use config::{Opt, SmtpConfig};
pub use honeypot::SmtpHoneypot;

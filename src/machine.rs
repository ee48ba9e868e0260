use std::sync::Arc;

use crate::auth::{Authenticator, CredentialAttempt, Identity, Mechanism, Verdict};
use crate::codec;
use crate::command::Command;
use crate::config::SmtpConfig;
use crate::error::CodecError;
use crate::reply::Reply;
use crate::session::{Phase, SmtpSession};

const DENIED: &str = "5.7.8 Authentication credentials invalid";
const LOGIN_USERNAME_PROMPT: &str = "VXNlcm5hbWU6";
const LOGIN_PASSWORD_PROMPT: &str = "UGFzc3dvcmQ6";

/// Outcome of feeding one line to the engine.
#[derive(Debug, Default)]
pub struct Transition {
    pub replies: Vec<Reply>,
    pub attempt: Option<CredentialAttempt>,
    pub close: bool,
}

impl Transition {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            ..Default::default()
        }
    }

    fn with_attempt(mut self, attempt: Option<CredentialAttempt>) -> Self {
        self.attempt = attempt;
        self
    }

    /// Whether the engine answered with an authentication failure.
    pub fn is_denial(&self) -> bool {
        self.replies.iter().any(Reply::is_denial)
    }
}

/// The SMTP dialogue, without any I/O. One instance is shared by all sessions.
pub struct Engine {
    config: Arc<SmtpConfig>,
    authenticator: Arc<dyn Authenticator>,
}

impl Engine {
    pub fn new(config: Arc<SmtpConfig>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            config,
            authenticator,
        }
    }

    pub fn greet(&self, session: &mut SmtpSession) -> Reply {
        session.enter(Phase::Ready);
        Reply::new(
            220,
            format!("{} {}", self.config.hostname, self.config.banner),
        )
    }

    pub fn handle_line(&self, session: &mut SmtpSession, line: &[u8]) -> Transition {
        let text = String::from_utf8_lossy(line);

        if Command::is_quit(&text) {
            let attempt = session.abandon("quit during authentication");
            session.close();
            return Transition {
                replies: vec![Reply::new(221, "2.0.0 Bye")],
                attempt,
                close: true,
            };
        }

        if session.phase().mechanism().is_some() && text.trim() == "*" {
            let attempt = session.abandon("cancelled by client");
            return Transition::reply(Reply::new(501, "5.7.0 Authentication cancelled"))
                .with_attempt(attempt);
        }

        let transition = match session.phase() {
            Phase::AwaitingCramResponse => self.cram_response(session, &text),
            Phase::AwaitingPlainResponse => self.plain_response(session, &text),
            Phase::AwaitingLoginUser => self.login_user(session, &text),
            Phase::AwaitingLoginPassword => self.login_password(session, &text),
            Phase::Greeting | Phase::AwaitingAuthMechanism | Phase::Ready => {
                session.enter(Phase::Ready);
                self.command(session, Command::parse(&text))
            }
            Phase::Closed => {
                return Transition {
                    close: true,
                    ..Default::default()
                }
            }
        };

        tracing::debug!(
            peer = %session.client_addr,
            phase = %session.phase(),
            "line handled"
        );
        transition
    }

    fn command(&self, session: &mut SmtpSession, command: Command) -> Transition {
        let reply = match command {
            Command::Ehlo(Some(host)) => {
                let lines = vec![
                    format!("{} Hello {}", self.config.hostname, host),
                    "PIPELINING".to_string(),
                    "SIZE 10240000".to_string(),
                    "8BITMIME".to_string(),
                    format!("AUTH {}", Mechanism::advertised()),
                    format!("AUTH={}", Mechanism::advertised()),
                    "HELP".to_string(),
                ];
                session.helo = Some(host);
                Reply::multiline(250, lines)
            }
            Command::Helo(Some(host)) => {
                let reply = Reply::new(250, format!("{} Hello {}", self.config.hostname, host));
                session.helo = Some(host);
                reply
            }
            Command::Ehlo(None) => Reply::new(501, "5.5.4 Syntax: EHLO hostname"),
            Command::Helo(None) => Reply::new(501, "5.5.4 Syntax: HELO hostname"),
            Command::Auth {
                mechanism: None, ..
            } => Reply::new(501, "5.5.4 Syntax: AUTH mechanism"),
            Command::Auth {
                mechanism: Some(name),
                initial,
            } => match name.parse::<Mechanism>() {
                Ok(mechanism) => {
                    session.enter(Phase::AwaitingAuthMechanism);
                    return self.start_mechanism(session, mechanism, initial);
                }
                Err(()) => Reply::new(504, "5.5.4 Unrecognized authentication type"),
            },
            Command::Mail | Command::Rcpt | Command::Data => {
                Reply::new(530, "5.7.0 Authentication required")
            }
            Command::Rset | Command::Noop => Reply::new(250, "2.0.0 OK"),
            Command::Vrfy => Reply::new(252, "2.0.0 Cannot VRFY user"),
            Command::Help => Reply::new(214, "2.0.0 See RFC 5321"),
            Command::StartTls => Reply::new(454, "4.7.0 TLS not available due to local problem"),
            Command::Quit => {
                session.close();
                return Transition {
                    replies: vec![Reply::new(221, "2.0.0 Bye")],
                    close: true,
                    ..Default::default()
                };
            }
            Command::Empty => Reply::new(500, "5.5.2 Error: bad syntax"),
            Command::Unknown(_) => Reply::new(500, "5.5.2 Command not recognized"),
        };
        Transition::reply(reply)
    }

    fn start_mechanism(
        &self,
        session: &mut SmtpSession,
        mechanism: Mechanism,
        initial: Option<String>,
    ) -> Transition {
        let descriptor = mechanism.descriptor();
        tracing::debug!(
            peer = %session.client_addr,
            mechanism = descriptor.name,
            round_trips = descriptor.round_trips,
            initial_response = initial.is_some(),
            "auth started"
        );

        if initial.is_some() && !descriptor.initial_response {
            session.enter(Phase::Ready);
            return Transition::reply(Reply::new(501, "5.5.4 Syntax error in parameters"));
        }

        match (mechanism, initial) {
            (Mechanism::CramMd5, _) => {
                let challenge = codec::generate_cram_challenge(&self.config.hostname);
                let encoded = codec::encode_base64(&challenge);
                session.await_cram_response(challenge);
                Transition::reply(Reply::new(334, encoded))
            }
            (Mechanism::Plain, Some(arg)) => {
                session.enter(Phase::AwaitingPlainResponse);
                self.plain_response(session, &arg)
            }
            (Mechanism::Plain, None) => {
                session.enter(Phase::AwaitingPlainResponse);
                Transition::reply(Reply::new(334, ""))
            }
            (Mechanism::Login, Some(arg)) => {
                session.enter(Phase::AwaitingLoginUser);
                self.login_user(session, &arg)
            }
            (Mechanism::Login, None) => {
                session.enter(Phase::AwaitingLoginUser);
                Transition::reply(Reply::new(334, LOGIN_USERNAME_PROMPT))
            }
        }
    }

    fn cram_response(&self, session: &mut SmtpSession, text: &str) -> Transition {
        let challenge = session
            .pending_challenge()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .unwrap_or_default();
        match codec::decode_base64(text).and_then(|b| codec::decode_cram_response(&b)) {
            Ok(response) => self.finish(
                session,
                Mechanism::CramMd5,
                Identity::user(response.username),
                response.digest,
                Some(format!("challenge {}", challenge)),
            ),
            Err(e) => self.malformed(session, e, text),
        }
    }

    fn plain_response(&self, session: &mut SmtpSession, text: &str) -> Transition {
        match codec::decode_base64(text).and_then(|b| codec::decode_plain(&b)) {
            Ok(creds) => self.finish(
                session,
                Mechanism::Plain,
                Identity {
                    authzid: Some(creds.authzid),
                    username: creds.authcid,
                },
                creds.password,
                None,
            ),
            Err(e) => self.malformed(session, e, text),
        }
    }

    fn login_user(&self, session: &mut SmtpSession, text: &str) -> Transition {
        match codec::decode_base64(text) {
            Ok(bytes) => {
                session.await_login_password(String::from_utf8_lossy(&bytes).into_owned());
                Transition::reply(Reply::new(334, LOGIN_PASSWORD_PROMPT))
            }
            Err(e) => self.malformed(session, e, text),
        }
    }

    fn login_password(&self, session: &mut SmtpSession, text: &str) -> Transition {
        match codec::decode_base64(text) {
            Ok(bytes) => {
                let username = session.pending_username().unwrap_or_default().to_string();
                self.finish(
                    session,
                    Mechanism::Login,
                    Identity::user(username),
                    String::from_utf8_lossy(&bytes).into_owned(),
                    None,
                )
            }
            Err(e) => self.malformed(session, e, text),
        }
    }

    /// Every completed mechanism ends here, whatever its round trip count.
    fn finish(
        &self,
        session: &mut SmtpSession,
        mechanism: Mechanism,
        identity: Identity,
        secret: String,
        detail: Option<String>,
    ) -> Transition {
        let decision = self.authenticator.evaluate(mechanism, &identity, &secret);
        let mut attempt = session.attempt(mechanism, identity, secret, decision.verdict);
        attempt.detail = Some(match detail {
            Some(detail) => format!("{}; {}", decision.reason, detail),
            None => decision.reason.to_string(),
        });
        session.enter(Phase::Ready);

        let reply = match decision.verdict {
            Verdict::Denied => Reply::new(535, DENIED),
            Verdict::Accepted => Reply::new(235, "2.7.0 Authentication successful"),
        };
        Transition::reply(reply).with_attempt(Some(attempt))
    }

    fn malformed(&self, session: &mut SmtpSession, error: CodecError, raw: &str) -> Transition {
        let attempt = session.abandon(&format!("{}: {:?}", error, raw));
        Transition::reply(Reply::new(501, "5.5.2 Cannot decode response")).with_attempt(attempt)
    }
}

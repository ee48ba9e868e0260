/// Verbs understood in the `Ready` phase. Anything else is `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ehlo(Option<String>),
    Helo(Option<String>),
    Auth {
        mechanism: Option<String>,
        initial: Option<String>,
    },
    Mail,
    Rcpt,
    Data,
    Rset,
    Noop,
    Vrfy,
    Help,
    StartTls,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let verb = match parts.next() {
            Some(verb) => verb.to_ascii_uppercase(),
            None => return Command::Empty,
        };
        let arg = parts.next().map(str::to_string);

        match verb.as_str() {
            "EHLO" => Command::Ehlo(arg),
            "HELO" => Command::Helo(arg),
            "AUTH" => Command::Auth {
                mechanism: arg,
                initial: parts.next().map(str::to_string),
            },
            "MAIL" => Command::Mail,
            "RCPT" => Command::Rcpt,
            "DATA" => Command::Data,
            "RSET" => Command::Rset,
            "NOOP" => Command::Noop,
            "VRFY" | "EXPN" => Command::Vrfy,
            "HELP" => Command::Help,
            "STARTTLS" => Command::StartTls,
            "QUIT" => Command::Quit,
            _ => Command::Unknown(verb),
        }
    }

    /// `QUIT` is honoured in every phase, including mid-mechanism.
    pub fn is_quit(line: &str) -> bool {
        line.trim().eq_ignore_ascii_case("QUIT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verbs_case_insensitively() {
        assert_eq!(
            Command::parse("ehlo client.example"),
            Command::Ehlo(Some("client.example".into()))
        );
        assert_eq!(Command::parse("HELO"), Command::Helo(None));
        assert_eq!(Command::parse("  "), Command::Empty);
        assert_eq!(Command::parse("XYZZY 1"), Command::Unknown("XYZZY".into()));
    }

    #[test]
    fn parses_auth_arguments() {
        assert_eq!(
            Command::parse("AUTH PLAIN AHRlc3QAdGVzdA=="),
            Command::Auth {
                mechanism: Some("PLAIN".into()),
                initial: Some("AHRlc3QAdGVzdA==".into()),
            }
        );
        assert_eq!(
            Command::parse("AUTH"),
            Command::Auth {
                mechanism: None,
                initial: None,
            }
        );
    }

    #[test]
    fn quit_detection() {
        assert!(Command::is_quit("quit"));
        assert!(Command::is_quit("QUIT\r"));
        assert!(!Command::is_quit("UVVJVA=="));
    }
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use structopt::StructOpt;

use crate::line::DEFAULT_MAX_LINE;

/// Shortest command line RFC 5321 lets a server impose.
const MIN_LINE_LENGTH: usize = 512;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "smtp-auth-honeypot",
    about = "A SMTP honeypot capturing credentials submitted through AUTH",
    author = "2026, Philippe TEMESI <https://www.tems.be>"
)]
pub struct Opt {
    /// Run as daemon
    #[structopt(short = "d", long = "daemon")]
    pub daemon: bool,

    /// Disable the SMTP capability (nothing is listened on)
    #[structopt(long = "disable")]
    pub disable: bool,

    /// Listening ports (can be specified multiple times, default: 25)
    #[structopt(short = "p", long = "port", default_value = "25", number_of_values = 1)]
    pub ports: Vec<u16>,

    /// Listening address (default: 0.0.0.0)
    #[structopt(short = "a", long = "address", default_value = "0.0.0.0")]
    pub address: String,

    /// Host name announced in the banner, EHLO reply and CRAM-MD5 challenges
    #[structopt(long = "hostname", default_value = "mail.example.com")]
    pub hostname: String,

    /// Banner text following the host name in the 220 greeting
    #[structopt(long = "banner", default_value = "ESMTP Postfix")]
    pub banner: String,

    /// Maximum command line length in bytes
    #[structopt(long = "max-line-length", default_value = "4096")]
    pub max_line_length: usize,

    /// Seconds without a complete line before the connection is dropped
    #[structopt(long = "idle-timeout", default_value = "300")]
    pub idle_timeout: u64,

    /// Banner delay in milliseconds (default: 0)
    #[structopt(long = "banner-delay", default_value = "0")]
    pub banner_delay: u64,

    /// Delay in milliseconds before every authentication failure (default: 0)
    #[structopt(long = "auth-delay", default_value = "0")]
    pub auth_delay: u64,

    /// Capture log file path
    #[structopt(long = "logs", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    /// Verbose mode - trace every SMTP line
    #[structopt(short = "v", long = "verbose")]
    pub verbose: bool,

    /// Enable raw display (not filtered) - DANGEROUS
    #[structopt(short = "r", long = "raw")]
    pub raw_display: bool,
}

/// What the engine and the acceptor need to know.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub ports: Vec<u16>,
    pub address: String,
    pub hostname: String,
    pub banner: String,
    pub max_line_length: usize,
    pub idle_timeout: Duration,
    pub banner_delay: Duration,
    pub auth_delay: Duration,
    pub log_file: Option<PathBuf>,
    pub raw_display: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ports: vec![25],
            address: "0.0.0.0".to_string(),
            hostname: "mail.example.com".to_string(),
            banner: "ESMTP Postfix".to_string(),
            max_line_length: DEFAULT_MAX_LINE,
            idle_timeout: Duration::from_secs(300),
            banner_delay: Duration::ZERO,
            auth_delay: Duration::ZERO,
            log_file: None,
            raw_display: false,
        }
    }
}

impl From<&Opt> for SmtpConfig {
    fn from(opt: &Opt) -> Self {
        Self {
            enabled: !opt.disable,
            ports: opt.ports.clone(),
            address: opt.address.clone(),
            hostname: opt.hostname.clone(),
            banner: opt.banner.clone(),
            max_line_length: opt.max_line_length,
            idle_timeout: Duration::from_secs(opt.idle_timeout),
            banner_delay: Duration::from_millis(opt.banner_delay),
            auth_delay: Duration::from_millis(opt.auth_delay),
            log_file: opt.log_file.clone(),
            raw_display: opt.raw_display,
        }
    }
}

impl SmtpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            bail!("at least one port must be specified with --port");
        }
        if self.hostname.trim().is_empty() {
            bail!("hostname must not be empty");
        }
        if self.max_line_length < MIN_LINE_LENGTH {
            bail!(
                "max line length {} is below the SMTP minimum of {}",
                self.max_line_length,
                MIN_LINE_LENGTH
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_cli() {
        let opt = Opt::from_iter(vec!["smtp-auth-honeypot"]);
        let config = SmtpConfig::from(&opt);
        assert!(config.enabled);
        assert_eq!(config.ports, vec![25]);
        assert_eq!(config.max_line_length, 4096);
        assert_eq!(config.auth_delay, Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn repeated_ports_and_disable() {
        let opt = Opt::from_iter(vec![
            "smtp-auth-honeypot",
            "-p",
            "25",
            "-p",
            "587",
            "--disable",
            "--banner",
            "Test",
        ]);
        let config = SmtpConfig::from(&opt);
        assert_eq!(config.ports, vec![25, 587]);
        assert!(!config.enabled);
        assert_eq!(config.banner, "Test");
    }

    #[test]
    fn validate_rejects_tiny_lines() {
        let config = SmtpConfig {
            max_line_length: 64,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

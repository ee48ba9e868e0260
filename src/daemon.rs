#[cfg(unix)]
pub fn daemonize() -> anyhow::Result<()> {
    use daemonize::Daemonize;

    let daemonize = Daemonize::new()
        .pid_file("/tmp/smtp-auth-honeypot.pid")
        .chown_pid_file(true)
        .working_directory(".");

    daemonize
        .start()
        .map_err(|e| anyhow::anyhow!("Failed to start daemon mode: {}", e))
}

#[cfg(not(unix))]
pub fn daemonize() -> anyhow::Result<()> {
    tracing::warn!("daemon mode not supported on this platform, staying in foreground");
    Ok(())
}

//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] completes on the first of:
//! - unix: `SIGINT`, `SIGTERM` (systemd, Kubernetes), `SIGQUIT`
//! - elsewhere: Ctrl-C
//!
//! Used by [`Engine::run_until_signal`](crate::Engine::run_until_signal).

/// Waits for a termination signal; `Err` if the handlers cannot be installed.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    tracing::info!(signal = name, "termination signal received");
    Ok(())
}

/// Waits for a termination signal; `Err` if the handler cannot be installed.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "termination signal received");
    Ok(())
}

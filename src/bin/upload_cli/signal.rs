//! Ctrl-C handling.
//!
//! The first interrupt cancels cooperatively so undelivered runs stay queued;
//! a second one exits at once.

use mteval_upload::CancelToken;

/// Exit status after a second interrupt.
const EXIT_INTERRUPTED: i32 = 130;

/// Watch for Ctrl-C on a background thread and trip `cancel`.
pub fn install(cancel: CancelToken) {
    let spawned = std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::debug!(%err, "interrupt handler unavailable");
                    return;
                }
            };
            runtime.block_on(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                tracing::warn!(
                    "interrupt received; finishing the current attempt (Ctrl-C again to abort)"
                );
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(EXIT_INTERRUPTED);
                }
            });
        });
    if let Err(err) = spawned {
        tracing::debug!(%err, "failed to start interrupt handler");
    }
}

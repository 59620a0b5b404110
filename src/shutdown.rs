// ===============================
// src/shutdown.rs
// ===============================
use tokio::sync::watch;

/// Resolves once the flag is `true`. Pends forever if the sender is gone.
pub async fn stopped(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

//! Graceful shutdown via an injected cancellation token

pub use tokio_util::sync::CancellationToken;

/// Cancel `token` on the first Ctrl-C / SIGINT.
///
/// Cancellation only stops admission of new work; calls already in
/// flight finish normally. Must be called inside a tokio runtime.
pub fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    log::warn!("Interrupt received, finishing in-flight calls and stopping");
                    token.cancel();
                }
                Err(e) => log::error!("failed to listen for Ctrl-C: {e}"),
            },
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watcher_exits_when_token_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let handle = cancel_on_ctrl_c(token.clone());
        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn token_untouched_until_signal() {
        let token = CancellationToken::new();
        let handle = cancel_on_ctrl_c(token.clone());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(!token.is_cancelled());
        assert!(!handle.is_finished());
        handle.abort();
    }
}

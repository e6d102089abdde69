pub mod records;
pub mod serve;
pub mod worker;

use tokio::sync::watch;

/// Resolves once `true` is sent, or once the sender is gone
pub async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

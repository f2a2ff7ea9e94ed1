use std::{process::Child, time::Duration};

use tokio::time;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Check if a child process is still running.
pub fn is_running(child: &mut Child) -> bool {
    match child.try_wait() {
        Ok(None) => true,
        Ok(Some(_)) | Err(_) => false,
    }
}

/// Returns true if the process exited within the timeout, false otherwise.
pub async fn wait_for_exit(child: &mut Child, timeout: Duration) -> bool {
    time::timeout(timeout, async {
        loop {
            if !is_running(child) {
                return;
            }
            time::sleep(EXIT_POLL_INTERVAL).await;
        }
    })
    .await
    .is_ok()
}

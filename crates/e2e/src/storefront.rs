//! Storefront preflight
//!
//! Polls the storefront root before any browser is launched so an unreachable
//! staging site fails the run once instead of failing every case.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Wait until `base_url` answers with a non-error status
pub async fn wait_for_storefront(base_url: &str, timeout: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .danger_accept_invalid_certs(true)
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match client.get(base_url).send().await {
            Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                info!("Storefront {} is up ({})", base_url, resp.status());
                return Ok(());
            }
            Ok(resp) => warn!("Storefront returned {}", resp.status()),
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for storefront {}...", base_url);
                }
                if !e.is_connect() {
                    warn!("Storefront check error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout {
            return Err(E2eError::StorefrontUnreachable(attempts));
        }
        sleep(RETRY_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_healthy_storefront() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        wait_for_storefront(&format!("http://{}/", addr), Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_storefront() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let err = wait_for_storefront(&format!("http://{}/", addr), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::StorefrontUnreachable(n) if n >= 1));
    }
}

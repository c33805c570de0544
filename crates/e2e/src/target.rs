//! Reachability of the application under test
//!
//! The application is started outside this harness. Before a run we only
//! make sure something answers at the base URL.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::error::{E2eError, E2eResult};

/// Resolve a scenario path (`/relatorios`) or absolute URL against the base URL
pub fn resolve(base_url: &str, path: &str) -> E2eResult<String> {
    let base = Url::parse(base_url)?;
    Ok(base.join(path)?.to_string())
}

/// Poll `base_url` until it answers with any HTTP status below 500
pub async fn probe(base_url: &str, timeout_duration: Duration) -> E2eResult<()> {
    let url = Url::parse(base_url)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url.clone()).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                info!("Application answered at {} ({})", url, resp.status());
                return Ok(());
            }
            Ok(resp) => {
                warn!("Probe returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for application at {}...", url);
                }
                // Connection refused is expected while the app is starting
                if !e.is_connect() {
                    warn!("Probe error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout_duration {
            break;
        }
        sleep(Duration::from_millis(250)).await;
    }

    Err(E2eError::TargetUnreachable {
        url: url.to_string(),
        attempts,
    })
}

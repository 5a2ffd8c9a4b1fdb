//! Retry policy for a single upload part.
//!
//! Only the part `PUT` is retried. Session creation, finishing and adding the
//! resource each happen once.

use log::{debug, warn};
use reqwest::{Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const MAX_PART_ATTEMPTS: u32 = 3;
const PART_BACKOFF_BASE: Duration = Duration::from_millis(500);
const PART_BACKOFF_CAP: Duration = Duration::from_secs(2);

/// Pause before sending a part again after `failed_attempts` failures.
fn part_backoff(failed_attempts: u32) -> Duration {
    let doublings = failed_attempts.saturating_sub(1).min(8);
    PART_BACKOFF_BASE
        .saturating_mul(1 << doublings)
        .min(PART_BACKOFF_CAP)
}

/// Statuses after which the store may accept the same part bytes again.
fn store_may_recover(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn connection_may_recover(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.status().is_some_and(store_may_recover)
}

/// Sends part `part` until the store takes it or the attempts run out.
/// `send` must build a fresh request each call. The final response or error
/// is handed back unchanged so status mapping stays with the caller.
pub(crate) async fn send_part_with_retry<F, Fut>(
    part: usize,
    mut send: F,
) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 1u32;

    loop {
        let outcome = send().await;
        let failure = match &outcome {
            Ok(response) if store_may_recover(response.status()) => {
                Some(response.status().to_string())
            }
            Ok(_) => None,
            Err(err) if connection_may_recover(err) => Some(err.to_string()),
            Err(_) => None,
        };

        let Some(failure) = failure else {
            return outcome;
        };
        if attempt >= MAX_PART_ATTEMPTS {
            warn!("part {part} still failing after {attempt} attempts: {failure}");
            return outcome;
        }

        let delay = part_backoff(attempt);
        debug!("part {part} attempt {attempt} failed ({failure}); sending again in {delay:?}");
        sleep(delay).await;
        attempt += 1;
    }
}

//! Waiting helpers for scenario tests

use std::future::Future;
use std::time::Duration;
use mirror_dl::{Event, JobId};
use tokio::sync::broadcast::Receiver;

/// How a job's lifecycle ended, as seen on the event stream
#[derive(Debug, PartialEq, Eq)]
pub enum Terminal {
    /// `Event::Complete`
    Completed,
    /// `Event::Failed` with its error text
    Failed(String),
    /// `Event::Coalesced`: files left for a sibling
    Coalesced,
    /// Nothing arrived in time
    Timeout,
}

/// Wait for the terminal event of `id`
pub async fn wait_for_terminal(events: &mut Receiver<Event>, id: JobId, timeout: Duration) -> Terminal {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Complete { id: event_id, .. }) if event_id == id => {
                    return Terminal::Completed;
                }
                Ok(Event::Failed { id: event_id, error, .. }) if event_id == id => {
                    return Terminal::Failed(error);
                }
                Ok(Event::Coalesced { id: event_id }) if event_id == id => {
                    return Terminal::Coalesced;
                }
                Ok(_) => continue,
                Err(_) => return Terminal::Timeout,
            }
        }
    })
    .await;

    result.unwrap_or(Terminal::Timeout)
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

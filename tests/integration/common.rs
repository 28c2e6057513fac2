//! Helpers shared by the integration tests.

use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use selfswap::update::{UpdateEvent, UpdateState};

/// Upper bound for any single wait in the suite.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Receive events until `predicate` matches, returning everything seen.
///
/// Panics when the stream closes or nothing matches within [`EVENT_TIMEOUT`].
pub async fn wait_for(
    events: &mut UnboundedReceiver<UpdateEvent>,
    mut predicate: impl FnMut(&UpdateEvent) -> bool,
) -> Vec<UpdateEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for event; seen so far: {seen:?}"))
            .unwrap_or_else(|| panic!("event stream closed; seen so far: {seen:?}"));
        let done = predicate(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Receive whatever arrives within `window`.
pub async fn collect_for(events: &mut UnboundedReceiver<UpdateEvent>, window: Duration) -> Vec<UpdateEvent> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        seen.push(event);
    }
    seen
}

/// Whether the event is a transition into `state`.
pub fn entered(event: &UpdateEvent, state: UpdateState) -> bool {
    matches!(event, UpdateEvent::StateChanged { state: s } if *s == state)
}

/// The states visited, in order.
pub fn states(events: &[UpdateEvent]) -> Vec<UpdateState> {
    events
        .iter()
        .filter_map(|e| match e {
            UpdateEvent::StateChanged {
                state,
            } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Number of events matching `predicate`.
pub fn count(events: &[UpdateEvent], predicate: impl Fn(&UpdateEvent) -> bool) -> usize {
    events.iter().filter(|e| predicate(e)).count()
}

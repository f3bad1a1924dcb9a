use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::{collect_events, DeployProcessed, EventNotification, ExecutionResult, StreamMessage};

/// A deploy whose outcome the watcher still owes a callback for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingDeploy {
    pub deploy_hash: String,
    pub deploy_type: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Listening,
}

pub type EventCallback = Box<dyn FnMut(EventNotification) + Send + 'static>;

/// Tracks submitted deploys and reconciles them against the node's stream of
/// execution outcomes. One watcher per contract client; at most one active
/// subscription at a time.
pub struct DeployWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    state: Mutex<ListenerState>,
    pending: Mutex<Vec<PendingDeploy>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for DeployWatcher {
    fn default() -> Self {
        DeployWatcher {
            inner: Arc::new(WatcherInner {
                state: Mutex::new(ListenerState::Idle),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl DeployWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a deploy to be matched against future outcomes. Valid
    /// whether or not a listener is attached yet; callers own the uniqueness
    /// of real deploy hashes, so no dedup happens here.
    pub fn record_pending(&self, deploy_type: &str, deploy_hash: &str) {
        lock(&self.inner.pending).push(PendingDeploy {
            deploy_hash: deploy_hash.to_string(),
            deploy_type: deploy_type.to_string(),
        });
    }

    pub fn pending(&self) -> Vec<PendingDeploy> {
        lock(&self.inner.pending).clone()
    }

    pub fn state(&self) -> ListenerState {
        *lock(&self.inner.state)
    }

    /// Transitions `Idle -> Listening` and spawns the listener task. Must be
    /// called from within a tokio runtime.
    pub fn listen(
        &self,
        stream_url: String,
        contract_package_hash: String,
        event_names: Vec<String>,
        callback: EventCallback,
    ) -> Result<EventHandle, Error> {
        {
            let mut state = lock(&self.inner.state);
            match *state {
                ListenerState::Listening => return Err(Error::AlreadyListening),
                ListenerState::Idle => *state = ListenerState::Listening,
            }
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(run_listener(
            stream_url,
            contract_package_hash,
            event_names,
            callback,
            Arc::clone(&self.inner),
        ));
        Ok(EventHandle { inner, task })
    }
}

/// Handle to an active subscription. Stopping consumes the handle: the
/// listener task is aborted, all pending deploys are discarded (outcomes
/// still outstanding at that point receive no callback), and the watcher
/// returns to `Idle` so a new listener may be started.
pub struct EventHandle {
    inner: Arc<WatcherInner>,
    task: JoinHandle<()>,
}

impl EventHandle {
    pub fn stop(self) {
        self.task.abort();
        lock(&self.inner.pending).clear();
        *lock(&self.inner.state) = ListenerState::Idle;
        info!("event listener stopped");
    }
}

async fn run_listener(
    stream_url: String,
    contract_package_hash: String,
    event_names: Vec<String>,
    callback: EventCallback,
    inner: Arc<WatcherInner>,
) {
    match subscribe(&stream_url).await {
        Ok(outcomes) => {
            info!(url = %stream_url, "subscribed to event stream");
            consume_outcomes(outcomes, inner, contract_package_hash, event_names, callback).await;
            info!("event stream ended");
        }
        Err(err) => warn!(url = %stream_url, %err, "could not connect to event stream"),
    }
}

/// Drains the outcome stream one item at a time. All callbacks for one
/// outcome fire before the next outcome is read, so callback executions
/// never overlap.
async fn consume_outcomes<S>(
    mut outcomes: S,
    inner: Arc<WatcherInner>,
    contract_package_hash: String,
    event_names: Vec<String>,
    mut callback: EventCallback,
) where
    S: Stream<Item = DeployProcessed> + Unpin,
{
    while let Some(processed) = outcomes.next().await {
        let notifications = {
            let mut pending = lock(&inner.pending);
            correlate(&mut pending, &processed, &contract_package_hash, &event_names)
        };
        for notification in notifications {
            callback(notification);
        }
    }
}

/// Resolves one execution outcome against the pending list.
///
/// Unknown deploy hashes are ignored. A matched entry is removed exactly
/// once: a failure yields a single callback payload carrying the tracked
/// deploy type; a success yields one payload per matching event record, in
/// transform order, which may be none at all.
pub(crate) fn correlate(
    pending: &mut Vec<PendingDeploy>,
    processed: &DeployProcessed,
    contract_package_hash: &str,
    event_names: &[String],
) -> Vec<EventNotification> {
    let position = match pending
        .iter()
        .position(|p| p.deploy_hash == processed.deploy_hash)
    {
        Some(position) => position,
        None => return Vec::new(),
    };
    let tracked = pending.remove(position);

    match &processed.execution_result {
        ExecutionResult::Failure { error_message } => vec![EventNotification {
            event_name: tracked.deploy_type,
            deploy_hash: processed.deploy_hash.clone(),
            success: false,
            error: Some(error_message.clone()),
            data: None,
        }],
        ExecutionResult::Success { effect } => {
            collect_events(&effect.transforms, contract_package_hash, event_names)
                .into_iter()
                .map(|event| EventNotification {
                    event_name: event.name,
                    deploy_hash: processed.deploy_hash.clone(),
                    success: true,
                    error: None,
                    data: Some(event.data),
                })
                .collect()
        }
    }
}

/// Connects to the node's SSE endpoint and yields deploy outcomes as they
/// arrive. Messages other than `DeployProcessed` are skipped.
async fn subscribe(
    stream_url: &str,
) -> Result<std::pin::Pin<Box<dyn Stream<Item = DeployProcessed> + Send>>, Error> {
    let response = reqwest::get(stream_url).await?.error_for_status()?;
    let bytes = Box::pin(response.bytes_stream());

    let stream = futures::stream::unfold((bytes, String::new()), |(mut bytes, mut buffer)| async move {
        loop {
            if let Some(line_end) = buffer.find('\n') {
                let line: String = buffer.drain(..=line_end).collect();
                if let Some(processed) = parse_stream_line(line.trim_end()) {
                    return Some((processed, (bytes, buffer)));
                }
                continue;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buffer.push_str(&String::from_utf8_lossy(&chunk)),
                Some(Err(err)) => {
                    warn!(%err, "event stream read failed");
                    return None;
                }
                None => return None,
            }
        }
    });

    Ok(Box::pin(stream))
}

fn parse_stream_line(line: &str) -> Option<DeployProcessed> {
    let payload = line.strip_prefix("data:")?.trim_start();
    match serde_json::from_str::<StreamMessage>(payload) {
        Ok(message) => message.deploy_processed,
        Err(err) => {
            debug!(%err, "skipping undecodable stream message");
            None
        }
    }
}

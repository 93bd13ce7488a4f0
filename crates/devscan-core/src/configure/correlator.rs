//! Request/response correlation for configure requests.
//!
//! Every request gets a correlation id that is unique among pending requests.
//! The pending entry is removed exactly once, either by the matching response
//! or by the timeout timer, and only the side that removed it invokes the
//! callback. Callbacks run after the lock is released.
//!
//! Requests must be sent from within a tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::query::{ConfigurationOutcome, ConfigurationQuery, OutcomeCallback};
use crate::error::ConfigureError;
use crate::protocol::{encode_configure_request, ConfigurationResponse};
use crate::settings::CorrelatorSettings;

/// Attempts made to find a free correlation id before giving up.
const ID_ATTEMPTS: usize = 16;

/// A serialized request ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub id: String,
    pub target_device_uuid: String,
    pub payload: String,
    /// Multicast hop limit
    pub ttl: u32,
}

/// Outbound half of the transport.
///
/// Implementations must not block on the network.
pub trait RequestSink: Send + Sync {
    fn send(&self, request: &OutgoingRequest) -> Result<(), ConfigureError>;
}

struct PendingQuery {
    target_device_uuid: String,
    callback: OutcomeCallback,
    started: Instant,
    timer: JoinHandle<()>,
}

struct CorrelatorState {
    pending: HashMap<String, PendingQuery>,
    running: bool,
}

struct Shared {
    state: Mutex<CorrelatorState>,
    sink: Arc<dyn RequestSink>,
    settings: CorrelatorSettings,
    next_id: AtomicU64,
}

impl Shared {
    fn time_out(&self, id: &str) {
        let Some(pending) = self.state.lock().pending.remove(id) else {
            debug!(id, "Timeout for already completed request ignored");
            return;
        };

        let elapsed_millis = pending.started.elapsed().as_millis() as u64;
        warn!(
            id,
            device = %pending.target_device_uuid,
            elapsed_millis,
            "Configure request timed out"
        );
        (pending.callback)(ConfigurationOutcome::Timeout { elapsed_millis });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for (_, pending) in self.state.get_mut().pending.drain() {
            pending.timer.abort();
        }
    }
}

/// Matches configure responses to pending requests.
#[derive(Clone)]
pub struct ConfigCorrelator {
    shared: Arc<Shared>,
}

impl ConfigCorrelator {
    pub fn new(sink: Arc<dyn RequestSink>, settings: CorrelatorSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CorrelatorState {
                    pending: HashMap::new(),
                    running: true,
                }),
                sink,
                settings,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn allocate_id(&self, state: &CorrelatorState) -> Result<String, ConfigureError> {
        for _ in 0..ID_ATTEMPTS {
            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed).to_string();
            if !state.pending.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(ConfigureError::ExhaustedIdSpace)
    }

    fn arm(&self, id: String, timeout: Duration) -> JoinHandle<()> {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = shared.upgrade() {
                shared.time_out(&id);
            }
        })
    }

    /// Send a configure request. `callback` receives exactly one outcome
    /// unless the correlator is shut down first.
    ///
    /// Errors are reported synchronously and the callback is then never called.
    pub fn send_configuration(
        &self,
        query: ConfigurationQuery,
        callback: OutcomeCallback,
    ) -> Result<String, ConfigureError> {
        query.validate()?;

        let settings = &self.shared.settings;
        let timeout = query.timeout.unwrap_or_else(|| settings.default_timeout());
        let ttl = query.ttl.unwrap_or(settings.default_ttl);

        let request = {
            let mut state = self.shared.state.lock();
            if !state.running {
                return Err(ConfigureError::NotRunning);
            }
            if state.pending.len() >= settings.max_pending {
                return Err(ConfigureError::TooManyPending {
                    limit: settings.max_pending,
                });
            }

            let id = self.allocate_id(&state)?;
            let request = OutgoingRequest {
                payload: encode_configure_request(&id, &query, ttl),
                id: id.clone(),
                target_device_uuid: query.target_device_uuid.clone(),
                ttl,
            };

            let timer = self.arm(id.clone(), timeout);
            state.pending.insert(
                id,
                PendingQuery {
                    target_device_uuid: query.target_device_uuid,
                    callback,
                    started: Instant::now(),
                    timer,
                },
            );
            request
        };

        if let Err(e) = self.shared.sink.send(&request) {
            warn!(id = %request.id, error = %e, "Failed to send configure request");
            // If the timer already won, the callback has reported the outcome
            let removed = self.shared.state.lock().pending.remove(&request.id);
            if let Some(pending) = removed {
                pending.timer.abort();
                return Err(e);
            }
            return Ok(request.id);
        }

        info!(
            id = %request.id,
            device = %request.target_device_uuid,
            timeout_ms = timeout.as_millis() as u64,
            "Configure request sent"
        );
        Ok(request.id)
    }

    /// Send a configure request and wait for its outcome.
    pub async fn configure(
        &self,
        query: ConfigurationQuery,
    ) -> Result<ConfigurationOutcome, ConfigureError> {
        let (tx, rx) = oneshot::channel::<ConfigurationOutcome>();
        self.send_configuration(
            query,
            Box::new(move |outcome: ConfigurationOutcome| {
                let _ = tx.send(outcome);
            }),
        )?;
        rx.await.map_err(|_| ConfigureError::Cancelled)
    }

    /// Deliver a response from the transport.
    ///
    /// Returns `false` when no pending request has this id; such responses are
    /// late, duplicated or meant for another host, and are dropped.
    pub fn handle_response(&self, response: ConfigurationResponse) -> bool {
        let Some(pending) = self.shared.state.lock().pending.remove(&response.id) else {
            debug!(id = %response.id, "Unmatched configure response dropped");
            return false;
        };
        pending.timer.abort();

        let outcome = if response.is_error() {
            let response = response.normalized();
            if let Some(error) = &response.error {
                warn!(
                    id = %response.id,
                    device = %pending.target_device_uuid,
                    code = error.code,
                    message = %error.message,
                    "Configure request failed"
                );
            }
            ConfigurationOutcome::Error(response)
        } else {
            info!(id = %response.id, device = %pending.target_device_uuid, "Configure request succeeded");
            ConfigurationOutcome::Success(response)
        };

        (pending.callback)(outcome);
        true
    }

    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Cancel every pending request without invoking its callback.
    pub fn shutdown(&self) {
        let drained: Vec<PendingQuery> = {
            let mut state = self.shared.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
            state.pending.drain().map(|(_, pending)| pending).collect()
        };

        let cancelled = drained.len();
        for pending in drained {
            pending.timer.abort();
        }
        info!(cancelled, "Configuration correlator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configure::query::NetSettingsRequest;
    use serde_json::json;
    use tokio::time::sleep;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<OutgoingRequest>>,
        fail: bool,
    }

    impl RequestSink for RecordingSink {
        fn send(&self, request: &OutgoingRequest) -> Result<(), ConfigureError> {
            if self.fail {
                return Err(ConfigureError::Transport("network unreachable".to_string()));
            }
            self.sent.lock().push(request.clone());
            Ok(())
        }
    }

    fn setup() -> (ConfigCorrelator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let correlator = ConfigCorrelator::new(sink.clone(), CorrelatorSettings::default());
        (correlator, sink)
    }

    fn query() -> ConfigurationQuery {
        ConfigurationQuery::new("0009E5001234", NetSettingsRequest::dhcp("eth0"))
            .with_timeout(Duration::from_millis(1000))
    }

    fn recorder() -> (Arc<Mutex<Vec<ConfigurationOutcome>>>, OutcomeCallback) {
        let outcomes: Arc<Mutex<Vec<ConfigurationOutcome>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = outcomes.clone();
        let callback: OutcomeCallback =
            Box::new(move |outcome: ConfigurationOutcome| sink.lock().push(outcome));
        (outcomes, callback)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_before_timeout() {
        let (correlator, sink) = setup();
        let (outcomes, callback) = recorder();

        let id = correlator.send_configuration(query(), callback).unwrap();
        assert_eq!(sink.sent.lock()[0].id, id);
        assert_eq!(correlator.pending_count(), 1);

        sleep(Duration::from_millis(200)).await;
        assert!(correlator.handle_response(ConfigurationResponse::success(id, json!(0))));

        sleep(Duration::from_secs(5)).await;
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_success());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_once() {
        let (correlator, _sink) = setup();
        let (outcomes, callback) = recorder();

        correlator.send_configuration(query(), callback).unwrap();
        sleep(Duration::from_millis(999)).await;
        assert!(outcomes.lock().is_empty());

        sleep(Duration::from_secs(5)).await;
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0],
            ConfigurationOutcome::Timeout { elapsed_millis } if elapsed_millis >= 1000
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_discarded() {
        let (correlator, _sink) = setup();
        let (outcomes, callback) = recorder();

        let id = correlator.send_configuration(query(), callback).unwrap();
        sleep(Duration::from_millis(1500)).await;

        assert!(!correlator.handle_response(ConfigurationResponse::success(id, json!(0))));
        assert_eq!(outcomes.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_and_malformed_responses() {
        let (correlator, _sink) = setup();

        let (outcomes, callback) = recorder();
        let id = correlator.send_configuration(query(), callback).unwrap();
        correlator.handle_response(ConfigurationResponse::failure(id, -32602, "Invalid params"));
        assert!(matches!(outcomes.lock()[0], ConfigurationOutcome::Error(_)));

        // Both fields present: the error wins
        let (outcomes, callback) = recorder();
        let id = correlator.send_configuration(query(), callback).unwrap();
        let mut both = ConfigurationResponse::failure(id, 1, "boom");
        both.result = Some(json!(0));
        correlator.handle_response(both);
        assert!(matches!(outcomes.lock()[0], ConfigurationOutcome::Error(_)));

        // Neither field present: reported as an error with a description
        let (outcomes, callback) = recorder();
        let id = correlator.send_configuration(query(), callback).unwrap();
        correlator.handle_response(ConfigurationResponse {
            id,
            result: None,
            error: None,
        });
        let outcomes = outcomes.lock();
        let ConfigurationOutcome::Error(response) = &outcomes[0] else {
            panic!("expected error outcome");
        };
        assert!(response.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_and_duplicate_responses() {
        let (correlator, _sink) = setup();
        let (outcomes, callback) = recorder();

        assert!(!correlator.handle_response(ConfigurationResponse::success("nope", json!(0))));

        let id = correlator.send_configuration(query(), callback).unwrap();
        assert!(correlator.handle_response(ConfigurationResponse::success(id.clone(), json!(0))));
        assert!(!correlator.handle_response(ConfigurationResponse::success(id, json!(0))));
        assert_eq!(outcomes.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_unique_and_payload_carries_id() {
        let (correlator, sink) = setup();
        let (_o1, c1) = recorder();
        let (_o2, c2) = recorder();

        let a = correlator.send_configuration(query(), c1).unwrap();
        let b = correlator.send_configuration(query(), c2).unwrap();
        assert_ne!(a, b);

        let sent = sink.sent.lock();
        let payload: serde_json::Value = serde_json::from_str(&sent[1].payload).unwrap();
        assert_eq!(payload["id"], json!(b));
        assert_eq!(sent[1].ttl, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_synchronous() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let correlator = ConfigCorrelator::new(sink, CorrelatorSettings::default());
        let (outcomes, callback) = recorder();

        let result = correlator.send_configuration(query(), callback);
        assert!(matches!(result, Err(ConfigureError::Transport(_))));
        assert_eq!(correlator.pending_count(), 0);

        sleep(Duration::from_secs(5)).await;
        assert!(outcomes.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_limit() {
        let sink = Arc::new(RecordingSink::default());
        let correlator = ConfigCorrelator::new(
            sink,
            CorrelatorSettings {
                max_pending: 1,
                ..Default::default()
            },
        );
        let (_o1, c1) = recorder();
        let (_o2, c2) = recorder();

        correlator.send_configuration(query(), c1).unwrap();
        assert!(matches!(
            correlator.send_configuration(query(), c2),
            Err(ConfigureError::TooManyPending { limit: 1 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configure_async() {
        let (correlator, sink) = setup();

        let responder = {
            let correlator = correlator.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(100)).await;
                let id = sink.sent.lock()[0].id.clone();
                correlator.handle_response(ConfigurationResponse::success(id, json!(0)));
            })
        };

        let outcome = correlator.configure(query()).await.unwrap();
        assert!(outcome.is_success());
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_suppresses_callbacks() {
        let (correlator, _sink) = setup();
        let (outcomes, callback) = recorder();

        correlator.send_configuration(query(), callback).unwrap();
        correlator.shutdown();

        sleep(Duration::from_secs(5)).await;
        assert!(outcomes.lock().is_empty());
        assert!(matches!(
            correlator.configure(query()).await,
            Err(ConfigureError::NotRunning)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_space_exhausted_when_next_ids_are_taken() {
        let (correlator, sink) = setup();
        let (taken_outcomes, _) = recorder();

        {
            let mut state = correlator.shared.state.lock();
            let next = correlator.shared.next_id.load(Ordering::Relaxed);
            for id in next..next + ID_ATTEMPTS as u64 {
                let outcomes = taken_outcomes.clone();
                state.pending.insert(
                    id.to_string(),
                    PendingQuery {
                        target_device_uuid: "other".to_string(),
                        callback: Box::new(move |outcome: ConfigurationOutcome| {
                            outcomes.lock().push(outcome)
                        }),
                        started: Instant::now(),
                        timer: tokio::spawn(async {}),
                    },
                );
            }
        }

        let (outcomes, callback) = recorder();
        assert!(matches!(
            correlator.send_configuration(query(), callback),
            Err(ConfigureError::ExhaustedIdSpace)
        ));
        assert!(sink.sent.lock().is_empty());
        assert_eq!(correlator.pending_count(), ID_ATTEMPTS);

        sleep(Duration::from_secs(5)).await;
        assert!(outcomes.lock().is_empty());
        assert!(taken_outcomes.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_response_racing_timeout_reports_once() {
        let (correlator, _sink) = setup();
        let mut recorded = Vec::new();
        let mut responders = Vec::new();

        for i in 0..2000u64 {
            let (outcomes, callback) = recorder();
            let query = query().with_timeout(Duration::from_millis(1));
            let id = correlator.send_configuration(query, callback).unwrap();
            recorded.push(outcomes);

            let correlator = correlator.clone();
            responders.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    tokio::task::yield_now().await;
                } else {
                    sleep(Duration::from_millis(1)).await;
                }
                correlator.handle_response(ConfigurationResponse::success(id, json!(0)));
            }));
        }
        for responder in responders {
            responder.await.unwrap();
        }
        sleep(Duration::from_millis(100)).await;

        for (i, outcomes) in recorded.iter().enumerate() {
            let reported = outcomes.lock().len();
            assert_eq!(reported, 1, "query {} reported {} outcomes", i, reported);
        }
        assert_eq!(correlator.pending_count(), 0);
    }
}

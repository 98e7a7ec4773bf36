//! Client session: owns the store, drives the gateway and republishes a fresh
//! snapshot (with the recomputed trend) after every mutation.
//!
//! ```text
//! ┌──────────────┐  fetch/analyze  ┌──────────────┐  mutate  ┌──────────────┐
//! │   Gateway    │───────────────►│   Session    │────────►│ InsightStore │
//! └──────────────┘                 └──────────────┘          └──────────────┘
//!                                         │ project()
//!                                         ▼
//!                                  watch::Sender<SessionSnapshot>
//! ```
//!
//! Spawned calls live in a `JoinSet` owned by the session, so dropping the
//! session aborts them and a torn-down session never sees late updates.
//! `spawn_load` and `submit` must be called from inside a tokio runtime.

use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::{Config, ResponseOrdering};
use crate::gateway::{AnalysisGateway, GatewayError, HttpGateway};
use crate::insight::Insight;
use crate::logging::{log, log_store_change, log_trend, obj, v_str, Domain, Level};
use crate::store::InsightStore;
use crate::trend::{project, ChartSeries};

/// Submission sequence number. Larger means submitted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("could not load insights: {0}")]
    Load(GatewayError),

    #[error("could not analyze {headline:?}: {error}")]
    Analyze { headline: String, error: GatewayError },
}

impl SessionError {
    pub fn gateway_error(&self) -> &GatewayError {
        match self {
            SessionError::Load(e) => e,
            SessionError::Analyze { error, .. } => error,
        }
    }
}

/// What a renderer reads. Rebuilt after every change.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub revision: u64,
    pub insights: Vec<Insight>,
    pub history: Vec<Insight>,
    pub current: Option<Insight>,
    pub chart: ChartSeries,
    /// Text in the headline input. Never cleared by a submission.
    pub draft: String,
    /// Most recent failure; cleared by the next successful call.
    pub last_error: Option<SessionError>,
    pub pending: usize,
}

struct SessionState {
    store: InsightStore,
    ordering: ResponseOrdering,
    /// Tickets of ad-hoc results at the head of history, newest submission first.
    landed: Vec<Ticket>,
    /// Ticket of the ad-hoc result currently shown. Survives a re-seed.
    current_ticket: Option<Ticket>,
    draft: String,
    last_error: Option<SessionError>,
    pending: usize,
}

impl SessionState {
    fn new(ordering: ResponseOrdering) -> Self {
        Self {
            store: InsightStore::new(),
            ordering,
            landed: Vec::new(),
            current_ticket: None,
            draft: String::new(),
            last_error: None,
            pending: 0,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let chart = project(self.store.history());
        log_trend(chart.len(), chart.values.first().copied());
        SessionSnapshot {
            revision: self.store.revision(),
            insights: self.store.insights().to_vec(),
            history: self.store.history().to_vec(),
            current: self.store.current_result().cloned(),
            chart,
            draft: self.draft.clone(),
            last_error: self.last_error.clone(),
            pending: self.pending,
        }
    }

    fn record(&mut self, ticket: Ticket, insight: Insight) {
        match self.ordering {
            ResponseOrdering::Arrival => self.store.record_analysis(insight),
            ResponseOrdering::Submission => {
                let depth = self.landed.iter().take_while(|t| **t > ticket).count();
                if depth > 0 {
                    log(
                        Level::Info,
                        Domain::Session,
                        "late_response",
                        obj(&[("ticket", json!(ticket.0)), ("depth", json!(depth))]),
                    );
                }
                let make_current = self.current_ticket.map_or(true, |t| ticket > t);
                if make_current {
                    self.current_ticket = Some(ticket);
                }
                self.store.place_analysis(insight, depth, make_current);
                self.landed.insert(depth, ticket);
            }
        }
    }
}

struct Shared {
    state: Mutex<SessionState>,
    tx: watch::Sender<SessionSnapshot>,
    next_ticket: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: &SessionState) {
        self.tx.send_replace(state.snapshot());
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::SeqCst));
        let mut state = self.lock();
        state.pending += 1;
        self.publish(&state);
        InFlight {
            shared: Arc::clone(self),
            ticket,
            landed: false,
        }
    }

    fn finish_load(&self, res: Result<Vec<Insight>, GatewayError>) -> Result<usize, GatewayError> {
        let mut state = self.lock();
        state.pending = state.pending.saturating_sub(1);
        let out = match res {
            Ok(insights) => {
                let n = insights.len();
                state.store.seed(insights);
                state.landed.clear();
                state.last_error = None;
                log_store_change("seed", state.store.revision(), state.store.history().len());
                Ok(n)
            }
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Session,
                    "load_failed",
                    obj(&[("kind", v_str(err.kind())), ("msg", v_str(&err.to_string()))]),
                );
                state.last_error = Some(SessionError::Load(err.clone()));
                Err(err)
            }
        };
        self.publish(&state);
        out
    }

    fn finish_analysis(
        &self,
        ticket: Ticket,
        headline: &str,
        res: Result<Insight, GatewayError>,
    ) -> Result<Insight, GatewayError> {
        let mut state = self.lock();
        state.pending = state.pending.saturating_sub(1);
        let out = match res {
            Ok(insight) => {
                state.record(ticket, insight.clone());
                state.last_error = None;
                log_store_change("record_analysis", state.store.revision(), state.store.history().len());
                Ok(insight)
            }
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Session,
                    "analyze_failed",
                    obj(&[
                        ("ticket", json!(ticket.0)),
                        ("kind", v_str(err.kind())),
                        ("msg", v_str(&err.to_string())),
                    ]),
                );
                state.last_error = Some(SessionError::Analyze {
                    headline: headline.to_string(),
                    error: err.clone(),
                });
                Err(err)
            }
        };
        self.publish(&state);
        out
    }
}

/// One counted call. `pending` is decremented by `finish_*` once the call
/// lands, or on drop if the future is cancelled or aborted first.
struct InFlight {
    shared: Arc<Shared>,
    ticket: Ticket,
    landed: bool,
}

impl InFlight {
    fn land(mut self) -> (Arc<Shared>, Ticket) {
        self.landed = true;
        (Arc::clone(&self.shared), self.ticket)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.landed {
            return;
        }
        let mut state = self.shared.lock();
        state.pending = state.pending.saturating_sub(1);
        self.shared.publish(&state);
        log(
            Level::Debug,
            Domain::Session,
            "call_cancelled",
            obj(&[("ticket", json!(self.ticket.0))]),
        );
    }
}

async fn run_load(flight: InFlight, gateway: &dyn AnalysisGateway) -> Result<usize, GatewayError> {
    let res = gateway.fetch_insights().await;
    let (shared, _) = flight.land();
    shared.finish_load(res)
}

async fn run_analysis(
    flight: InFlight,
    gateway: &dyn AnalysisGateway,
    headline: &str,
) -> Result<Insight, GatewayError> {
    let res = gateway.analyze(headline).await;
    let (shared, ticket) = flight.land();
    shared.finish_analysis(ticket, headline, res)
}

pub struct InsightSession {
    shared: Arc<Shared>,
    gateway: Arc<dyn AnalysisGateway>,
    tasks: JoinSet<()>,
}

impl InsightSession {
    pub fn new(gateway: Arc<dyn AnalysisGateway>, ordering: ResponseOrdering) -> Self {
        let state = SessionState::new(ordering);
        let (tx, _rx) = watch::channel(state.snapshot());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                tx,
                next_ticket: AtomicU64::new(1),
            }),
            gateway,
            tasks: JoinSet::new(),
        }
    }

    /// Session backed by the HTTP gateway at `cfg.api_base`.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(Arc::new(HttpGateway::new(cfg)), cfg.ordering)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.tx.borrow().clone()
    }

    pub fn ordering(&self) -> ResponseOrdering {
        self.shared.lock().ordering
    }

    /// Fetch the bulk listing and seed the store. On failure the store is untouched.
    pub async fn load(&self) -> Result<usize, GatewayError> {
        let flight = self.shared.begin();
        run_load(flight, self.gateway.as_ref()).await
    }

    /// Analyze one headline and record the result. On failure the store is untouched.
    pub async fn analyze(&self, headline: &str) -> Result<Insight, GatewayError> {
        let flight = self.shared.begin();
        run_analysis(flight, self.gateway.as_ref(), headline).await
    }

    /// Background variant of [`load`](Self::load). Errors land in `last_error`.
    pub fn spawn_load(&mut self) {
        let flight = self.shared.begin();
        let gateway = Arc::clone(&self.gateway);
        self.tasks.spawn(async move {
            let _ = run_load(flight, gateway.as_ref()).await;
        });
    }

    /// Background variant of [`analyze`](Self::analyze). Overlapping
    /// submissions are allowed; see [`ResponseOrdering`] for how they land.
    pub fn submit(&mut self, headline: impl Into<String>) -> Ticket {
        let headline = headline.into();
        let flight = self.shared.begin();
        let ticket = flight.ticket;
        let gateway = Arc::clone(&self.gateway);
        self.tasks.spawn(async move {
            let _ = run_analysis(flight, gateway.as_ref(), &headline).await;
        });
        ticket
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        let mut state = self.shared.lock();
        state.draft = text.into();
        self.shared.publish(&state);
    }

    /// Submit whatever is in the input, empty or not. The draft is kept.
    pub fn submit_draft(&mut self) -> Ticket {
        let draft = self.shared.lock().draft.clone();
        self.submit(draft)
    }

    /// Wait for every spawned call to finish.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    log(
                        Level::Error,
                        Domain::Session,
                        "task_panicked",
                        obj(&[("msg", v_str(&err.to_string()))]),
                    );
                }
            }
        }
    }

    /// Abort all in-flight calls. Their results are discarded and `pending`
    /// drops as each aborted call is torn down.
    pub fn shutdown(&mut self) {
        self.tasks.abort_all();
        log(Level::Info, Domain::Session, "shutdown", obj(&[]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_order_places_late_result_behind_newer() {
        let mut state = SessionState::new(ResponseOrdering::Submission);
        state.store.seed(vec![Insight::new("S", "neutral", 0.5, "SPY", None)]);
        state.record(Ticket(2), Insight::new("second", "neutral", 0.2, "SPY", None));
        state.record(Ticket(1), Insight::new("first", "neutral", 0.1, "SPY", None));

        let heads: Vec<_> = state.store.history().iter().map(|i| i.headline.as_str()).collect();
        assert_eq!(heads, vec!["second", "first", "S"]);
        assert_eq!(state.store.current_result().unwrap().headline, "second");
        assert_eq!(state.landed, vec![Ticket(2), Ticket(1)]);
    }

    #[test]
    fn test_arrival_order_prepends_late_result() {
        let mut state = SessionState::new(ResponseOrdering::Arrival);
        state.record(Ticket(2), Insight::new("second", "neutral", 0.2, "SPY", None));
        state.record(Ticket(1), Insight::new("first", "neutral", 0.1, "SPY", None));

        let heads: Vec<_> = state.store.history().iter().map(|i| i.headline.as_str()).collect();
        assert_eq!(heads, vec!["first", "second"]);
        assert_eq!(state.store.current_result().unwrap().headline, "first");
        assert!(state.landed.is_empty());
    }

    #[test]
    fn test_snapshot_carries_projected_chart() {
        let mut state = SessionState::new(ResponseOrdering::Arrival);
        state.store.seed(vec![
            Insight::new("A", "positive", 0.8, "GLD", None),
            Insight::new("B", "negative", 0.4, "USO", None),
        ]);
        let snap = state.snapshot();
        assert_eq!(snap.chart.labels, vec!["#2", "#1"]);
        assert_eq!(snap.chart, project(&snap.history));
        assert_eq!(snap.revision, 1);
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::Analyze {
            headline: "x".into(),
            error: GatewayError::Network("timeout".into()),
        };
        assert_eq!(err.to_string(), "could not analyze \"x\": network error: timeout");
        assert_eq!(err.gateway_error().kind(), "network");
    }
}

//! The stream orchestrator: the single-owner task that mutates the
//! interrupt stack and ticker rotator, and publishes `stream.state` /
//! `alert.expired` transitions.
//!
//! Grounded on `omnibar-app`'s `TorrentOrchestrator` (a `RwLock`-guarded
//! catalog mutated from a `spawn_post_processing` bus-subscriber task) and
//! its single-owner-task discipline, generalized from one `RwLock<HashMap>`
//! per concern to one `Mutex`-guarded struct covering the stack, the
//! rotator, and the show mapping together, since the active-alert
//! algorithm requires a consistent view across all three.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use omnibar_config::ShowMapping;
use omnibar_events::{Event, EventBus};
use omnibar_telemetry::Metrics;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

use crate::algorithm::{active_alert, build_stream_state, ActiveAlert};
use crate::alert::Alert;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::policy::AlertPolicy;
use crate::stack::InterruptStack;
use crate::state::StreamState;
use crate::ticker::TickerRotator;

struct Inner {
    stack: InterruptStack,
    ticker: TickerRotator,
    show_mapping: ShowMapping,
    current_game_id: u64,
}

/// Owns the interrupt stack, ticker rotator, and show mapping for one
/// process, and keeps the published [`StreamState`] snapshot in sync.
pub struct StreamOrchestrator {
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<StreamState>,
    events: EventBus,
    metrics: Metrics,
    policy: AlertPolicy,
    ticker_interval: StdDuration,
}

impl StreamOrchestrator {
    /// Construct an orchestrator and its initial snapshot receiver.
    #[must_use]
    pub fn new(
        events: EventBus,
        metrics: Metrics,
        ticker_tags: Vec<String>,
        show_mapping: ShowMapping,
        policy: AlertPolicy,
        ticker_interval: StdDuration,
    ) -> (Arc<Self>, watch::Receiver<StreamState>) {
        let initial_show = show_mapping.show_for(0).to_string();
        let (snapshot_tx, snapshot_rx) = watch::channel(StreamState::idle(initial_show));
        let orchestrator = Arc::new(Self {
            inner: Mutex::new(Inner {
                stack: InterruptStack::new(),
                ticker: TickerRotator::new(ticker_tags),
                show_mapping,
                current_game_id: 0,
            }),
            snapshot_tx,
            events,
            metrics,
            policy,
            ticker_interval,
        });
        (orchestrator, snapshot_rx)
    }

    /// Latest published stream state.
    #[must_use]
    pub fn snapshot(&self) -> StreamState {
        self.snapshot_tx.borrow().clone()
    }

    /// Push a regular alert onto the interrupt stack and recompute state.
    pub async fn raise_alert(&self, alert: Alert, now: DateTime<Utc>) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        let dropped = inner.stack.push(alert, now);
        self.record_overflow(dropped);
        self.recompute_and_publish(&mut inner, now).await
    }

    /// Apply a subscription event: coalesce into the live `sub_train` entry
    /// if one exists, otherwise create it.
    pub async fn raise_subscription(
        &self,
        alert_id: impl Into<String>,
        latest: serde_json::Value,
        now: DateTime<Utc>,
    ) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        let priority = self.policy.subscription_priority;
        let dropped = inner.stack.push_subscription(alert_id, now, priority, latest);
        self.record_overflow(dropped);
        self.recompute_and_publish(&mut inner, now).await
    }

    /// Update the current game id, which drives `current_show` via the
    /// show mapping.
    pub async fn game_changed(&self, game_id: u64, now: DateTime<Utc>) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        inner.current_game_id = game_id;
        self.recompute_and_publish(&mut inner, now).await
    }

    /// Replace the show mapping, e.g. on a `SIGHUP` config reload.
    pub async fn set_show_mapping(&self, show_mapping: ShowMapping, now: DateTime<Utc>) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        inner.show_mapping = show_mapping;
        self.recompute_and_publish(&mut inner, now).await
    }

    /// Periodic rotation tick: expire the stack, and advance the ticker
    /// cursor only if the currently active alert is the synthetic ticker
    /// (a dominant interrupt must never "eat" a rotation slot).
    pub async fn tick(&self, now: DateTime<Utc>) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock().await;
        let expired = inner.stack.expire(now);
        self.emit_expired(expired)?;

        if active_alert(&inner.stack, &inner.ticker).is_ticker() {
            inner.ticker.advance();
        }
        self.publish_state(&inner)
    }

    async fn recompute_and_publish(&self, inner: &mut Inner, now: DateTime<Utc>) -> OrchestratorResult<()> {
        let expired = inner.stack.expire(now);
        self.emit_expired(expired)?;
        self.publish_state(inner)
    }

    fn emit_expired(&self, expired: Vec<Alert>) -> OrchestratorResult<()> {
        for alert in expired {
            self.events
                .emit(Event::AlertExpired {
                    alert_id: alert.alert_id,
                })
                .map_err(|source| OrchestratorError::Publish { source })?;
        }
        Ok(())
    }

    fn publish_state(&self, inner: &Inner) -> OrchestratorResult<()> {
        let active = active_alert(&inner.stack, &inner.ticker);
        let priority_level = inner.stack.priority_level();
        let show = inner.show_mapping.show_for(inner.current_game_id).to_string();
        let state = build_stream_state(&active, priority_level, &show);

        self.metrics.set_interrupt_stack_depth(i64::try_from(inner.stack.len()).unwrap_or(i64::MAX));
        self.metrics
            .set_active_alert(matches!(active, ActiveAlert::Stack(_)));
        self.metrics
            .set_ticker_cursor(i64::try_from(inner.ticker.cursor()).unwrap_or(i64::MAX));

        if *self.snapshot_tx.borrow() == state {
            return Ok(());
        }

        self.events
            .emit(Event::StreamState {
                current_show: state.current_show.clone(),
                priority_level: state.priority_level.as_str().to_string(),
                active_content: state.active_content.clone(),
            })
            .map_err(|source| OrchestratorError::Publish { source })?;
        let _ = self.snapshot_tx.send(state);
        Ok(())
    }

    fn record_overflow(&self, dropped: u64) {
        for _ in 0..dropped {
            self.metrics.inc_alert_drop();
        }
    }

    /// Spawn the background task that advances the ticker rotator every
    /// `ticker_interval`.
    pub fn spawn_rotation_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let period = orchestrator.ticker_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(err) = orchestrator.tick(Utc::now()).await {
                    error!(error = %err, "rotation tick failed to publish state");
                }
            }
        })
    }

    /// Spawn the background task that subscribes to the event bus and
    /// translates source events into interrupt-stack mutations.
    pub fn spawn_event_subscriber(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut stream = orchestrator.events.subscribe(None);
            while let Some(result) = stream.next().await {
                let envelope = match result {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(error = %err, "orchestrator subscriber lagged, continuing");
                        continue;
                    }
                };
                if let Err(err) = orchestrator.handle_source_event(envelope.event, envelope.timestamp).await {
                    error!(error = %err, "failed to apply source event to interrupt stack");
                }
            }
        })
    }

    async fn handle_source_event(&self, event: Event, now: DateTime<Utc>) -> OrchestratorResult<()> {
        match event {
            Event::Follow { user_id, display_name } => {
                let alert = Alert {
                    alert_id: format!("follow-{user_id}-{}", now.timestamp_millis()),
                    kind: crate::alert::AlertKind::Alert,
                    priority: self.policy.follow_priority,
                    started_at: now,
                    ttl_deadline: now + chrono::Duration::milliseconds(self.policy.follow_ttl_ms),
                    data: serde_json::json!({ "user_id": user_id, "display_name": display_name }),
                };
                self.raise_alert(alert, now).await
            }
            Event::Redemption {
                user_id,
                display_name,
                reward_title,
            } => {
                let alert = Alert {
                    alert_id: format!("redemption-{user_id}-{}", now.timestamp_millis()),
                    kind: crate::alert::AlertKind::Alert,
                    priority: self.policy.redemption_priority,
                    started_at: now,
                    ttl_deadline: now + chrono::Duration::milliseconds(self.policy.redemption_ttl_ms),
                    data: serde_json::json!({
                        "user_id": user_id,
                        "display_name": display_name,
                        "reward_title": reward_title,
                    }),
                };
                self.raise_alert(alert, now).await
            }
            Event::Subscription {
                user_id,
                display_name,
                tier,
                months,
            } => {
                self.raise_subscription(
                    "sub-train",
                    serde_json::json!({
                        "user_id": user_id,
                        "display_name": display_name,
                        "tier": tier,
                        "months": months,
                    }),
                    now,
                )
                .await
            }
            Event::GameChanged { game_id } => self.game_changed(game_id, now).await,
            other => {
                info!(type_tag = other.type_tag(), "ignoring event not consumed by the orchestrator");
                Ok(())
            }
        }
    }
}

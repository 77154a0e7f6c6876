//! Process wiring: reads the environment and process-config file, builds
//! every crate's service, and drives the graceful-shutdown sequence.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use omnibar_adapters::spawn_game_telemetry;
use omnibar_config::{EnvConfig, ProcessConfigService, ShowMapping};
use omnibar_events::{Event, EventBus};
use omnibar_fleet::{FleetRouter, PeerClient, parse_peers, spawn_relay};
use omnibar_orchestrator::{AlertPolicy, StreamOrchestrator};
use omnibar_supervisor::ProcessSupervisor;
use omnibar_telemetry::{GlobalContextGuard, LoggingConfig, Metrics, init_logging};
use tokio::signal::unix::{SignalKind, signal};
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

const TICKER_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15);

/// Dependencies required to bootstrap the application, separated from
/// [`run_app`] so tests can construct them from a fixed environment.
pub(crate) struct BootstrapDependencies {
    env: EnvConfig,
    config: Arc<ProcessConfigService>,
    events: EventBus,
    metrics: Metrics,
}

impl BootstrapDependencies {
    pub(crate) async fn from_env() -> AppResult<Self> {
        let env = EnvConfig::from_env().map_err(|source| AppError::Env { source })?;
        let config = Arc::new(
            ProcessConfigService::load(env.config_file.as_str())
                .await
                .map_err(|source| AppError::Config { operation: "process_config.load", source })?,
        );
        let events = EventBus::new();
        let metrics = Metrics::new().map_err(|source| AppError::Telemetry { operation: "metrics.new", source })?;
        Ok(Self { env, config, events, metrics })
    }
}

/// Entry point for the application boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or startup fails. Per the
/// exit-code contract, a caller should map this to exit code 1.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env().await?;
    run_app_with(dependencies).await
}

pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let logging = LoggingConfig { level: dependencies.env.log_level.as_deref().unwrap_or(omnibar_telemetry::DEFAULT_LOG_LEVEL), ..LoggingConfig::default() };
    init_logging(&logging).map_err(|err| AppError::InvalidConfig {
        field: "log_level",
        reason: "subscriber_init_failed",
        value: Some(err.to_string()),
    })?;
    let _context = GlobalContextGuard::new("bootstrap");

    let BootstrapDependencies { env, config, events, metrics } = dependencies;
    info!(node_id = %env.node_id, "stream channel bootstrap starting");

    let reload_task = Arc::clone(&config)
        .watch_for_reload()
        .map_err(|source| AppError::Config { operation: "process_config.watch_for_reload", source })?;

    let (orchestrator, _snapshot_rx) = StreamOrchestrator::new(
        events.clone(),
        metrics.clone(),
        Vec::new(),
        ShowMapping::default(),
        AlertPolicy::default(),
        TICKER_INTERVAL,
    );
    let rotation_task = orchestrator.spawn_rotation_ticker();
    let subscriber_task = orchestrator.spawn_event_subscriber();

    let supervisor = ProcessSupervisor::new(env.node_id.clone(), events.clone(), metrics.clone());
    for (process_id, entry) in config.snapshot().await {
        supervisor
            .add(process_id.clone(), entry)
            .await
            .map_err(|source| AppError::Supervisor { process_id, source })?;
    }

    let peers = parse_peers(&env.cluster_peers);
    let fleet = Arc::new(FleetRouter::new(Arc::clone(&supervisor), &peers, metrics.clone()));
    for peer in &peers {
        spawn_relay(PeerClient::new(peer), events.clone());
    }

    let telemetry_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), env.tcp_port);
    let telemetry_handle = spawn_game_telemetry(telemetry_addr, events.clone(), metrics.clone())
        .await
        .map_err(|source| AppError::GameTelemetryBind { source })?;
    info!(addr = %telemetry_addr, "game telemetry listener ready");

    let start_order = Arc::new(Mutex::new(Vec::<String>::new()));
    let order_task = spawn_start_order_tracker(events.clone(), Arc::clone(&start_order));

    let port = if env.server_port == 0 {
        return Err(AppError::InvalidConfig { field: "server_port", reason: "zero", value: Some("0".to_string()) });
    } else {
        env.server_port
    };
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let api = omnibar_api::ApiServer::new(orchestrator, Arc::clone(&supervisor), fleet, events.clone(), metrics, env.node_id.clone());

    info!(addr = %addr, "launching stream channel listener");
    let mut serve_task = tokio::spawn(api.serve(addr));

    tokio::select! {
        result = &mut serve_task => {
            match result {
                Ok(Ok(())) => info!("api server exited cleanly"),
                Ok(Err(err)) => return Err(AppError::ApiServer { operation: "api_server.serve", source: err }),
                Err(join_err) => warn!(error = %join_err, "api server task panicked"),
            }
        }
        () = shutdown_signal() => {
            info!("shutdown signal received, draining supervised processes");
            serve_task.abort();
        }
    }

    stop_in_reverse_start_order(&supervisor, &start_order).await;

    telemetry_handle.cancel();
    for task in [rotation_task, subscriber_task, order_task, reload_task] {
        task.abort();
    }

    info!("stream channel bootstrap shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to install SIGTERM handler, falling back to SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

fn spawn_start_order_tracker(events: EventBus, order: Arc<Mutex<Vec<String>>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = events.subscribe(None);
        while let Some(result) = stream.next().await {
            let Ok(envelope) = result else { continue };
            if let Event::ProcessStateChanged { process_id, state, .. } = envelope.event {
                let mut order = order.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                match state.as_str() {
                    "running" => {
                        order.retain(|id| id != &process_id);
                        order.push(process_id);
                    }
                    "stopped" | "failed" => order.retain(|id| id != &process_id),
                    _ => {}
                }
            }
        }
    })
}

async fn stop_in_reverse_start_order(supervisor: &Arc<ProcessSupervisor>, order: &Mutex<Vec<String>>) {
    let ids: Vec<String> = {
        let guard = order.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.iter().rev().cloned().collect()
    };
    for process_id in ids {
        match supervisor.stop(&process_id).await {
            Ok(()) => info!(process_id = %process_id, "stopped supervised process for shutdown"),
            Err(err) => warn!(process_id = %process_id, error = %err, "failed to stop supervised process during shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_order_tracker_records_reverse_stop_order() {
        let events = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let task = spawn_start_order_tracker(events.clone(), Arc::clone(&order));
        tokio::task::yield_now().await;

        events
            .emit(Event::ProcessStateChanged { process_id: "a".into(), node_id: "n".into(), state: "running".into() })
            .expect("publish");
        events
            .emit(Event::ProcessStateChanged { process_id: "b".into(), node_id: "n".into(), state: "running".into() })
            .expect("publish");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let snapshot: Vec<String> = order.lock().unwrap().iter().rev().cloned().collect();
        assert_eq!(snapshot, vec!["b".to_string(), "a".to_string()]);
        task.abort();
    }
}

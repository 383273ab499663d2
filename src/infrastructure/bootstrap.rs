//! Composition root: builds every component once and hands out handles.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::adapter::outbound::chat::relay::RelayChatStream;
use crate::application::coordinator::{Coordinator, CoordinatorHandle};
use crate::application::router::Router;
use crate::application::status::RuntimeStatus;
use crate::application::store::PositionStore;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::factory::{chat, execution, persistence};
use crate::infrastructure::lock::InstanceLock;
use crate::infrastructure::reconnecting::ReconnectingChatStream;
use crate::infrastructure::reporting::HealthReportingGateway;
use crate::port::inbound::operator::control::Operator;
use crate::port::outbound::chat::ChatStream;
use crate::port::outbound::classifier::SignalClassifier;
use crate::port::outbound::execution::ExecutionGateway;

/// Fully wired instance, holding the instance lock until dropped.
pub struct Runtime {
    pub coordinator: Coordinator<ReconnectingChatStream<RelayChatStream>>,
    pub handle: CoordinatorHandle,
    lock: InstanceLock,
}

impl Runtime {
    #[must_use]
    pub fn lock(&self) -> &InstanceLock {
        &self.lock
    }
}

/// Wire a coordinator from already built parts.
///
/// The gateway is wrapped so broker outages reach `status`.
#[must_use]
pub fn assemble<S: ChatStream>(
    config: &Config,
    store: Arc<PositionStore>,
    stream: S,
    classifier: Arc<dyn SignalClassifier>,
    gateway: Arc<dyn ExecutionGateway>,
    status: Arc<RuntimeStatus>,
) -> Coordinator<S> {
    let gateway: Arc<dyn ExecutionGateway> =
        Arc::new(HealthReportingGateway::new(gateway, Arc::clone(&status)));
    let router = Router::new(
        store,
        Arc::clone(&gateway),
        config.trading.strategy.build(),
        config.routing_policy(),
    );
    Coordinator::new(
        stream,
        classifier,
        router,
        gateway,
        status,
        chat::channels(config),
    )
    .with_health_interval(Duration::from_secs(
        config.execution.health_check_interval_secs,
    ))
}

/// Take the instance lock, load state and build the production runtime.
///
/// # Errors
///
/// Fails when the lock is held or stale, the state file is unreadable, or an
/// adapter cannot be built.
pub fn build(config: &Config) -> Result<Runtime> {
    let lock = InstanceLock::acquire(&config.state.path)?;
    let store = persistence::open_store(&config.state)?;
    let gateway = execution::build_gateway(&config.execution)?;
    let status = Arc::new(RuntimeStatus::new(gateway.transport_name()));
    let classifier = chat::build_classifier(config)?;
    let stream = chat::build_chat_stream(config, Arc::clone(&status));

    let coordinator = assemble(config, store, stream, classifier, gateway, status);
    let handle = coordinator.handle();
    Ok(Runtime {
        coordinator,
        handle,
        lock,
    })
}

/// Run until Ctrl-C, SIGTERM, or the chat stream gives up.
///
/// # Errors
///
/// Returns startup errors from [`build`] and connection errors from the
/// coordinator.
pub async fn run(config: Config) -> Result<()> {
    let runtime = build(&config)?;
    info!(
        state = %config.state.path.display(),
        lock = %runtime.lock().path().display(),
        channels = config.chat.channels.len(),
        "signal-relay starting"
    );

    let Runtime {
        coordinator,
        handle,
        lock,
    } = runtime;

    let signals = tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            handle.shutdown();
        }
    });

    let result = coordinator.run().await;
    signals.abort();
    drop(lock);
    result
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::infrastructure::lock::lock_path;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.state.path = dir.join("state.json");
        config.chat.channels = vec!["gold".into()];
        config
    }

    #[test]
    fn build_takes_the_lock_and_releases_it_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let runtime = build(&config).unwrap();
        assert!(lock_path(&config.state.path).exists());
        assert!(matches!(build(&config), Err(Error::LockContention { .. })));
        assert_eq!(runtime.handle.status().transport, "paper");

        drop(runtime);
        assert!(!lock_path(&config.state.path).exists());
    }

    #[test]
    fn unreadable_state_fails_startup_and_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.state.path, "{ not json").unwrap();

        assert!(matches!(build(&config), Err(Error::Persistence(_))));
        assert!(!lock_path(&config.state.path).exists());
    }
}

//! Shared wiring for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use signal_relay::application::router::{Router, RoutingPolicy};
use signal_relay::application::store::PositionStore;
use signal_relay::domain::state::BotState;
use signal_relay::domain::strategy::StrategyKind;
use signal_relay::port::outbound::execution::ExecutionGateway;
use signal_relay::port::outbound::store::StateRepository;
use signal_relay::testkit::gateway::RecordingGateway;
use signal_relay::testkit::repository::MemoryRepository;

/// Router over in-memory fakes.
pub struct Harness {
    pub repository: Arc<MemoryRepository>,
    pub store: Arc<PositionStore>,
    pub gateway: Arc<RecordingGateway>,
    pub router: Router,
}

pub fn harness() -> Harness {
    harness_with(RoutingPolicy::default(), StrategyKind::DualTarget)
}

pub fn harness_with(policy: RoutingPolicy, strategy: StrategyKind) -> Harness {
    build(MemoryRepository::new(), policy, strategy)
}

/// Harness that starts from a previously saved state.
pub fn restored(state: BotState) -> Harness {
    build(
        MemoryRepository::with_state(state),
        RoutingPolicy::default(),
        StrategyKind::DualTarget,
    )
}

fn build(repository: MemoryRepository, policy: RoutingPolicy, strategy: StrategyKind) -> Harness {
    let repository = Arc::new(repository);
    let store = Arc::new(
        PositionStore::open(Arc::clone(&repository) as Arc<dyn StateRepository>, 20)
            .expect("open store"),
    );
    let gateway = Arc::new(RecordingGateway::new());
    let router = Router::new(
        Arc::clone(&store),
        Arc::clone(&gateway) as Arc<dyn ExecutionGateway>,
        strategy.build(),
        policy,
    );
    Harness {
        repository,
        store,
        gateway,
        router,
    }
}

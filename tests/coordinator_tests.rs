//! Coordinator: chat events through classification into the router.

use std::sync::Arc;
use std::time::Duration;

use signal_relay::application::coordinator::{Coordinator, EXECUTION_COMPONENT};
use signal_relay::application::router::Outcome;
use signal_relay::application::status::RuntimeStatus;
use signal_relay::application::store::PositionStore;
use signal_relay::domain::id::{ChannelId, MessageId};
use signal_relay::domain::state::BotState;
use signal_relay::error::ExecutionError;
use signal_relay::infrastructure::bootstrap::assemble;
use signal_relay::port::inbound::operator::control::Operator;
use signal_relay::port::inbound::operator::status::RunState;
use signal_relay::port::outbound::chat::{ChannelSubscription, ChatEvent, ChatStream};
use signal_relay::port::outbound::classifier::SignalClassifier;
use signal_relay::port::outbound::execution::ExecutionGateway;
use signal_relay::port::outbound::store::StateRepository;
use signal_relay::testkit::chat::{channel_chat, ScriptedChat};
use signal_relay::testkit::classifier::StubClassifier;
use signal_relay::testkit::config::config;
use signal_relay::testkit::domain::{chat_message, complete_signal, CHANNEL};
use signal_relay::testkit::gateway::RecordingGateway;
use signal_relay::testkit::repository::MemoryRepository;

struct Parts {
    store: Arc<PositionStore>,
    gateway: Arc<RecordingGateway>,
    classifier: Arc<StubClassifier>,
    status: Arc<RuntimeStatus>,
}

fn parts(state: Option<BotState>, classifier: StubClassifier) -> Parts {
    let repository = match state {
        Some(state) => MemoryRepository::with_state(state),
        None => MemoryRepository::new(),
    };
    let repository: Arc<dyn StateRepository> = Arc::new(repository);
    Parts {
        store: Arc::new(PositionStore::open(repository, 20).unwrap()),
        gateway: Arc::new(RecordingGateway::new()),
        classifier: Arc::new(classifier),
        status: Arc::new(RuntimeStatus::new("recording")),
    }
}

fn coordinator<S: ChatStream>(parts: &Parts, stream: S) -> Coordinator<S> {
    let mut config = config(&[CHANNEL]);
    config.execution.health_check_interval_secs = 0;
    assemble(
        &config,
        Arc::clone(&parts.store),
        stream,
        Arc::clone(&parts.classifier) as Arc<dyn SignalClassifier>,
        Arc::clone(&parts.gateway) as Arc<dyn ExecutionGateway>,
        Arc::clone(&parts.status),
    )
}

fn message(id: i64) -> ChatEvent {
    ChatEvent::Message(chat_message(id, "XAUUSD BUY NOW"))
}

fn gold() -> ChannelId {
    ChannelId::new(CHANNEL)
}

#[tokio::test]
async fn signals_are_routed_and_cursor_follows_every_message() {
    let p = parts(None, StubClassifier::new().with_signal(complete_signal(501)));
    let chat = ScriptedChat::new(vec![message(501), message(502)]);
    let subscriptions = chat.subscriptions();

    coordinator(&p, chat).run().await.unwrap();

    assert_eq!(p.gateway.placed().len(), 2);
    assert_eq!(p.store.cursor(&gold()), Some(MessageId::new(502)));
    assert_eq!(
        subscriptions.lock().clone(),
        vec![vec![ChannelSubscription {
            channel: gold(),
            after: None,
        }]]
    );
    let counters = p.status.counters();
    assert_eq!(counters.messages_seen, 2);
    assert_eq!(counters.opened, 1);
    assert_eq!(p.status.run_state(), RunState::Stopped);
}

#[tokio::test]
async fn restart_resumes_after_the_stored_cursor() {
    let mut state = BotState::default();
    state.advance_cursor(&gold(), MessageId::new(505));
    let p = parts(Some(state), StubClassifier::new());
    let chat = ScriptedChat::new(vec![message(504), message(505), message(506)]);
    let subscriptions = chat.subscriptions();

    coordinator(&p, chat).run().await.unwrap();

    assert_eq!(
        subscriptions.lock()[0][0].after,
        Some(MessageId::new(505))
    );
    assert_eq!(p.classifier.calls(), vec![MessageId::new(506)]);
    assert_eq!(p.store.cursor(&gold()), Some(MessageId::new(506)));
}

#[tokio::test]
async fn edits_of_old_messages_are_still_classified() {
    let mut state = BotState::default();
    state.advance_cursor(&gold(), MessageId::new(505));
    let p = parts(Some(state), StubClassifier::new());
    let mut edited = chat_message(501, "XAUUSD BUY SL 2640");
    edited.edited = true;

    coordinator(&p, ScriptedChat::new(vec![ChatEvent::Message(edited)]))
        .run()
        .await
        .unwrap();

    assert_eq!(p.classifier.calls(), vec![MessageId::new(501)]);
    assert_eq!(p.store.cursor(&gold()), Some(MessageId::new(505)));
}

#[tokio::test]
async fn classifier_failure_is_not_a_signal() {
    let p = parts(
        None,
        StubClassifier::new()
            .with_signal(complete_signal(501))
            .failing_on(501),
    );

    let outcome = coordinator(&p, ScriptedChat::new(Vec::new()))
        .process(chat_message(501, "XAUUSD BUY"))
        .await;

    assert!(outcome.is_none());
    assert!(p.gateway.placed().is_empty());
    assert_eq!(p.store.cursor(&gold()), Some(MessageId::new(501)));
}

#[tokio::test]
async fn routing_failure_is_reported_to_the_operator() {
    let p = parts(None, StubClassifier::new().with_signal(complete_signal(501)));
    p.gateway.fail_on(
        signal_relay::testkit::gateway::GatewayOp::Place,
        1,
        ExecutionError::Rejected("market closed".into()),
    );
    let coordinator = coordinator(&p, ScriptedChat::new(Vec::new()));
    let handle = coordinator.handle();

    assert!(coordinator.process(chat_message(501, "XAUUSD BUY")).await.is_none());

    let failures = handle.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message_id, MessageId::new(501));
    assert!(failures[0].cause.contains("market closed"));
    assert!(handle.positions().is_empty());
}

#[tokio::test]
async fn exhausted_retries_mark_execution_degraded() {
    let p = parts(
        None,
        StubClassifier::new()
            .with_signal(complete_signal(501))
            .with_signal(complete_signal(502)),
    );
    p.gateway.fail_on(
        signal_relay::testkit::gateway::GatewayOp::Place,
        1,
        ExecutionError::RetriesExhausted {
            operation: "place_order",
            attempts: 3,
            last: "no connection".into(),
        },
    );
    let coordinator = coordinator(&p, ScriptedChat::new(Vec::new()));
    let handle = coordinator.handle();

    assert!(coordinator.process(chat_message(501, "XAUUSD BUY")).await.is_none());
    assert!(p.status.is_degraded(EXECUTION_COMPONENT));
    assert_eq!(handle.status().degraded, vec![EXECUTION_COMPONENT.to_string()]);

    let outcome = coordinator.process(chat_message(502, "XAUUSD BUY")).await;
    assert!(matches!(outcome, Some(Outcome::Opened { .. })));
    assert!(!p.status.is_degraded(EXECUTION_COMPONENT));
}

#[tokio::test]
async fn disconnect_events_do_not_stop_the_loop() {
    let p = parts(None, StubClassifier::new().with_signal(complete_signal(502)));
    let chat = ScriptedChat::new(vec![
        ChatEvent::Disconnected {
            reason: "relay restarted".into(),
        },
        message(502),
    ]);

    coordinator(&p, chat).run().await.unwrap();

    assert_eq!(p.gateway.placed().len(), 2);
}

#[tokio::test]
async fn failed_connect_aborts_startup() {
    let p = parts(None, StubClassifier::new());
    let chat = ScriptedChat::new(vec![message(501)]).with_connect_results(vec![Err(
        signal_relay::error::Error::Connection("refused".into()),
    )]);

    assert!(coordinator(&p, chat).run().await.is_err());
    assert!(p.classifier.calls().is_empty());
}

#[tokio::test]
async fn paused_coordinator_holds_events_until_started() {
    let p = parts(None, StubClassifier::new());
    let (chat, sender) = channel_chat(8);
    let coordinator = coordinator(&p, chat);
    let handle = coordinator.handle();
    handle.stop();
    let task = tokio::spawn(coordinator.run());

    sender.send(message(501)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(p.classifier.calls().is_empty());
    assert_eq!(handle.status().run_state, RunState::Paused);

    handle.start();
    for _ in 0..100 {
        if !p.classifier.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(p.classifier.calls(), vec![MessageId::new(501)]);

    handle.shutdown();
    task.await.unwrap().unwrap();
    assert_eq!(handle.status().run_state, RunState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn failing_health_check_marks_terminal_degraded() {
    let p = parts(None, StubClassifier::new());
    p.gateway
        .set_ping_error(Some(ExecutionError::Transient("terminal offline".into())));
    let (chat, sender) = channel_chat(8);
    let coordinator = coordinator(&p, chat).with_health_interval(Duration::from_secs(30));
    let handle = coordinator.handle();
    let task = tokio::spawn(coordinator.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(p.status.is_degraded(EXECUTION_COMPONENT));
    assert!(p.gateway.reconnects() >= 1);

    p.gateway.set_ping_error(None);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!p.status.is_degraded(EXECUTION_COMPONENT));
    assert!(handle.status().degraded.is_empty());

    sender.end().await;
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn operator_clear_wipes_positions() {
    let p = parts(None, StubClassifier::new().with_signal(complete_signal(501)));
    let coordinator = coordinator(&p, ScriptedChat::new(Vec::new()));
    let handle = coordinator.handle();
    coordinator.process(chat_message(501, "XAUUSD BUY")).await;
    assert_eq!(handle.status().open_positions, 2);

    handle.clear().await.unwrap();

    assert!(handle.positions().is_empty());
    assert_eq!(p.store.cursor(&gold()), None);
}

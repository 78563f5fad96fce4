//! Session runtime tests on a paused tokio clock.
//!
//! With the clock paused tokio advances time whenever every task is idle, so
//! the ten second no-input timer elapses instantly unless something cancels
//! it first.

use async_trait::async_trait;
use parley::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
use parley::config::Settings;
use parley::core::Event;
use parley::dialogue::{self, events, services, speech_recognized, DialogueOutput};
use parley::effects::Action;
use parley::runtime::{
    ChannelSink, InvocationHandler, OutputSink, Services, Session, SessionError, SessionHandle,
    Snapshot,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Answers immediately with a fixed result.
struct MockService {
    result: Result<Value, String>,
}

impl MockService {
    fn ok(value: Value) -> Arc<dyn InvocationHandler> {
        Arc::new(Self { result: Ok(value) })
    }

    fn failing(error: &str) -> Arc<dyn InvocationHandler> {
        Arc::new(Self {
            result: Err(error.to_string()),
        })
    }
}

#[async_trait]
impl InvocationHandler for MockService {
    async fn invoke(&self, _input: Value, _cancel: CancellationToken) -> Result<Value, String> {
        self.result.clone()
    }
}

/// Never answers. Signals once it is running and again once it is
/// cancelled or dropped.
struct HangingService {
    started: Arc<Notify>,
    stopped: Arc<Notify>,
}

struct NotifyOnDrop(Arc<Notify>);

impl Drop for NotifyOnDrop {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}

#[async_trait]
impl InvocationHandler for HangingService {
    async fn invoke(&self, _input: Value, cancel: CancellationToken) -> Result<Value, String> {
        let _stopped = NotifyOnDrop(Arc::clone(&self.stopped));
        self.started.notify_one();
        cancel.cancelled().await;
        Err("cancelled".to_string())
    }
}

/// Takes a long time to deliver each output, keeping the session busy.
struct SlowSink {
    delay: Duration,
    delivered: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl OutputSink<String> for SlowSink {
    async fn deliver(&self, output: String) {
        tokio::time::sleep(self.delay).await;
        let _ = self.delivered.send(output);
    }
}

struct Running<O> {
    handle: SessionHandle,
    outputs: mpsc::UnboundedReceiver<O>,
    task: JoinHandle<Result<Snapshot, SessionError>>,
}

fn spawn_dialogue(services: Services) -> Running<DialogueOutput> {
    let settings = Settings::default();
    let machine = Arc::new(dialogue::machine(&settings).unwrap());
    let (sink, outputs) = ChannelSink::new();
    let (session, handle) = Session::new(machine, services, Arc::new(sink), &settings);
    Running {
        handle,
        outputs,
        task: tokio::spawn(session.run()),
    }
}

fn all_services(abstract_text: &str) -> Services {
    Services::from([
        (services::AUTHORIZE.to_string(), MockService::ok(json!("token"))),
        (
            services::KB_LOOKUP.to_string(),
            MockService::ok(json!({ "AbstractText": abstract_text })),
        ),
    ])
}

async fn wait_for(handle: &SessionHandle, path: &str) {
    let mut snapshots = handle.subscribe();
    snapshots
        .wait_for(|snapshot| snapshot.matches(path))
        .await
        .unwrap();
}

async fn send_all(handle: &SessionHandle, events: Vec<Event>) {
    for event in events {
        handle.send(event).await.unwrap();
    }
}

/// Clicks through to the menu question; returns once listening started.
async fn open_menu(running: &mut Running<DialogueOutput>) {
    wait_for(&running.handle, "asrtts.idle").await;
    send_all(
        &running.handle,
        vec![
            Event::new(events::CLICK),
            Event::new(events::CLICK),
            Event::new(events::TTS_FINISHED),
        ],
    )
    .await;
    assert!(matches!(
        running.outputs.recv().await,
        Some(DialogueOutput::Speak { .. })
    ));
    assert_eq!(
        running.outputs.recv().await,
        Some(DialogueOutput::StartListening)
    );
}

async fn next_speech(outputs: &mut mpsc::UnboundedReceiver<DialogueOutput>) -> String {
    loop {
        match outputs.recv().await {
            Some(DialogueOutput::Speak { text }) => return text,
            Some(_) => continue,
            None => panic!("session ended before speaking"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_authorization_reaches_idle() {
    let running = spawn_dialogue(all_services("x"));

    wait_for(&running.handle, "asrtts.idle").await;

    let snapshot = running.handle.snapshot();
    assert!(snapshot.matches("dm.idle"));
    assert_eq!(snapshot.context.get_str("authorization_token"), Some("token"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_authorization_fails_controller() {
    let services = Services::from([(
        services::AUTHORIZE.to_string(),
        MockService::failing("401 Unauthorized"),
    )]);
    let running = spawn_dialogue(services);

    wait_for(&running.handle, "asrtts.fail").await;
}

#[tokio::test(start_paused = true)]
async fn test_no_input_times_out() {
    let mut running = spawn_dialogue(all_services("x"));
    open_menu(&mut running).await;
    let listening_since = Instant::now();

    assert_eq!(
        running.outputs.recv().await,
        Some(DialogueOutput::StopListening)
    );
    assert!(listening_since.elapsed() >= Duration::from_secs(10));
    assert_eq!(
        next_speech(&mut running.outputs).await,
        "Do you want to book a meeting or find information about someone?"
    );
}

#[tokio::test(start_paused = true)]
async fn test_speech_start_cancels_timeout() {
    let mut running = spawn_dialogue(all_services("x"));
    open_menu(&mut running).await;

    running
        .handle
        .send(Event::new(events::SPEECH_START))
        .await
        .unwrap();
    wait_for(&running.handle, "asrtts.recognising.inprogress").await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(running.handle.snapshot().matches("asrtts.recognising.inprogress"));
    assert!(running.outputs.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_lookup_result_is_spoken() {
    let mut running = spawn_dialogue(all_services("A pioneer of computing."));
    open_menu(&mut running).await;

    send_all(
        &running.handle,
        vec![
            speech_recognized("information", 0.9),
            Event::new(events::TTS_FINISHED),
            speech_recognized("Ada Lovelace", 0.9),
        ],
    )
    .await;

    assert_eq!(
        next_speech(&mut running.outputs).await,
        "Ok, who do you want information about?"
    );
    assert_eq!(
        next_speech(&mut running.outputs).await,
        "OK, info on ada lovelace available"
    );
    running
        .handle
        .send(Event::new(events::TTS_FINISHED))
        .await
        .unwrap();
    assert_eq!(
        next_speech(&mut running.outputs).await,
        "A pioneer of computing."
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_lookup_handler_reaches_failure() {
    let services = Services::from([(
        services::AUTHORIZE.to_string(),
        MockService::ok(json!("token")),
    )]);
    let mut running = spawn_dialogue(services);
    open_menu(&mut running).await;

    send_all(
        &running.handle,
        vec![
            speech_recognized("information", 0.9),
            Event::new(events::TTS_FINISHED),
            speech_recognized("Ada Lovelace", 0.9),
        ],
    )
    .await;

    next_speech(&mut running.outputs).await;
    assert_eq!(
        next_speech(&mut running.outputs).await,
        "Sorry, there is no information on ada lovelace available."
    );
    wait_for(&running.handle, "dm.failure").await;
}

#[tokio::test(start_paused = true)]
async fn test_exit_cancels_running_invocation() {
    let started = Arc::new(Notify::new());
    let stopped = Arc::new(Notify::new());
    let services = Services::from([(
        "slow".to_string(),
        Arc::new(HangingService {
            started: Arc::clone(&started),
            stopped: Arc::clone(&stopped),
        }) as Arc<dyn InvocationHandler>,
    )]);
    let machine = MachineBuilder::new("root")
        .state(StateBuilder::new("waiting").invoke("slow").on("leave", "elsewhere"))
        .state(StateBuilder::new("elsewhere").entry(Action::emit(|_, _| Ok("left".to_string()))))
        .build()
        .unwrap();
    let (sink, mut outputs) = ChannelSink::new();
    let (session, handle) = Session::new(
        Arc::new(machine),
        services,
        Arc::new(sink),
        &Settings::default(),
    );
    let task = tokio::spawn(session.run());

    started.notified().await;
    handle.send(Event::new("leave")).await.unwrap();

    stopped.notified().await;
    assert_eq!(outputs.recv().await, Some("left".to_string()));
    wait_for(&handle, "elsewhere").await;

    handle.shutdown();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_session() {
    let running = spawn_dialogue(all_services("x"));
    wait_for(&running.handle, "asrtts.idle").await;

    running.handle.shutdown();
    let last = running.task.await.unwrap().unwrap();

    assert!(last.matches("asrtts.idle"));
    assert!(matches!(
        running.handle.send(Event::new(events::CLICK)).await,
        Err(SessionError::Closed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_ends_session() {
    let Running { handle, task, .. } = spawn_dialogue(all_services("x"));
    wait_for(&handle, "asrtts.idle").await;

    drop(handle);

    let last = task.await.unwrap().unwrap();
    assert!(last.matches("dm.idle"));
}

#[tokio::test(start_paused = true)]
async fn test_final_state_ends_session() {
    let machine = MachineBuilder::<String>::new("root")
        .state(StateBuilder::new("talking").on("bye", "done"))
        .state(StateBuilder::final_state("done"))
        .build()
        .unwrap();
    let (sink, _outputs) = ChannelSink::new();
    let (session, handle) = Session::new(
        Arc::new(machine),
        Services::new(),
        Arc::new(sink),
        &Settings::default(),
    );
    let task = tokio::spawn(session.run());

    handle.send(Event::new("bye")).await.unwrap();

    let last = task.await.unwrap().unwrap();
    assert!(last.done);
    assert!(handle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_events_keep_submission_order_while_busy() {
    let machine = MachineBuilder::new("root")
        .state(
            StateBuilder::new("waiting")
                .entry(Action::schedule("timeout", Duration::from_secs(10)))
                .on("timeout", "expired")
                .on("speech", "talking")
                .transition(
                    TransitionBuilder::on("ping").action(Action::emit(|_, _| Ok("pong".to_string()))),
                ),
        )
        .state(StateBuilder::new("expired"))
        .state(StateBuilder::new("talking"))
        .build()
        .unwrap();
    let (delivered, mut outputs) = mpsc::unbounded_channel();
    let sink = SlowSink {
        delay: Duration::from_secs(20),
        delivered,
    };
    let (session, handle) = Session::new(
        Arc::new(machine),
        Services::new(),
        Arc::new(sink),
        &Settings::default(),
    );
    let task = tokio::spawn(session.run());
    let started = Instant::now();

    // The session is stuck delivering "pong" until t=20. Speech arrives at
    // t=1 and the timer fires at t=10, both while it is busy.
    handle.send(Event::new("ping")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.send(Event::new("speech")).await.unwrap();

    assert_eq!(outputs.recv().await, Some("pong".to_string()));
    assert!(started.elapsed() >= Duration::from_secs(20));
    wait_for(&handle, "talking").await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.leaves, vec!["talking".to_string()]);

    handle.shutdown();
    task.await.unwrap().unwrap();
}

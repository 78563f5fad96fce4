//! Async session runtime.
//!
//! A [`Session`] owns an [`Interpreter`] and turns its effects into real
//! work: timers become sleeping tasks, invocations become spawned handler
//! calls, and outputs go to an [`OutputSink`]. Everything that completes in
//! the background is sent into the same queue as external events, so events
//! are processed in the order they were submitted and the interpreter is
//! only ever touched from one task.

use super::error::SessionError;
use super::interpreter::{Interpreter, Snapshot, StepOutcome};
use crate::config::Settings;
use crate::core::{Event, InvocationId, TimerId};
use crate::effects::Effect;
use crate::machine::Machine;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Runs the asynchronous work behind an `invoke`.
///
/// The token is cancelled when the invoking state exits; handlers should
/// stop early when it fires. Their result is discarded either way.
#[async_trait]
pub trait InvocationHandler: Send + Sync {
    async fn invoke(&self, input: Value, cancel: CancellationToken) -> Result<Value, String>;
}

#[async_trait]
impl<T: InvocationHandler + ?Sized> InvocationHandler for Arc<T> {
    async fn invoke(&self, input: Value, cancel: CancellationToken) -> Result<Value, String> {
        (**self).invoke(input, cancel).await
    }
}

/// Receives the domain outputs of a session in order.
#[async_trait]
pub trait OutputSink<O>: Send + Sync
where
    O: Send + 'static,
{
    async fn deliver(&self, output: O);
}

#[async_trait]
impl<O, T> OutputSink<O> for Arc<T>
where
    O: Send + 'static,
    T: OutputSink<O> + ?Sized,
{
    async fn deliver(&self, output: O) {
        (**self).deliver(output).await
    }
}

/// Forwards outputs into an unbounded channel.
pub struct ChannelSink<O> {
    tx: mpsc::UnboundedSender<O>,
}

impl<O> ChannelSink<O> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<O>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl<O: Send + 'static> OutputSink<O> for ChannelSink<O> {
    async fn deliver(&self, output: O) {
        if self.tx.send(output).is_err() {
            tracing::debug!("output receiver dropped");
        }
    }
}

/// Invocation handlers keyed by service name.
pub type Services = HashMap<String, Arc<dyn InvocationHandler>>;

/// Cancels its token when the last [`SessionHandle`] is dropped.
struct HandleGuard(CancellationToken);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Cloneable handle for talking to a running [`Session`].
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    events: mpsc::Sender<Event>,
    snapshots: watch::Receiver<Snapshot>,
    shutdown: CancellationToken,
    _guard: Arc<HandleGuard>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Deliver an external event. Waits while the event buffer is full.
    pub async fn send(&self, event: Event) -> Result<(), SessionError> {
        self.events
            .send(event)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// The snapshot published after the last processed macrostep.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified after every macrostep.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Ask the session to stop. Pending timers and invocations are cancelled.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

pub struct Session<O: Send + 'static> {
    id: Uuid,
    interpreter: Interpreter<O>,
    services: Services,
    sink: Arc<dyn OutputSink<O>>,
    events: mpsc::Receiver<Event>,
    /// Background tasks report into the external queue through this sender.
    completions: mpsc::Sender<Event>,
    snapshots: watch::Sender<Snapshot>,
    shutdown: CancellationToken,
    handles_dropped: CancellationToken,
    timers: HashMap<TimerId, CancellationToken>,
    invocations: HashMap<InvocationId, CancellationToken>,
}

impl<O: Send + 'static> Session<O> {
    pub fn new(
        machine: Arc<Machine<O>>,
        services: Services,
        sink: Arc<dyn OutputSink<O>>,
        settings: &Settings,
    ) -> (Self, SessionHandle) {
        let id = Uuid::new_v4();
        let interpreter = Interpreter::new(machine, settings.interpreter_options());
        let (events_tx, events) = mpsc::channel(settings.event_buffer.max(1));
        let (snapshots, snapshots_rx) = watch::channel(interpreter.snapshot());
        let shutdown = CancellationToken::new();
        let handles_dropped = CancellationToken::new();

        let handle = SessionHandle {
            id,
            events: events_tx.clone(),
            snapshots: snapshots_rx,
            shutdown: shutdown.clone(),
            _guard: Arc::new(HandleGuard(handles_dropped.clone())),
        };
        let session = Self {
            id,
            interpreter,
            services,
            sink,
            events,
            completions: events_tx,
            snapshots,
            shutdown,
            handles_dropped,
            timers: HashMap::new(),
            invocations: HashMap::new(),
        };
        (session, handle)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Start the interpreter and process events until the machine reaches a
    /// final state, every handle is dropped, or shutdown is requested.
    ///
    /// Returns the last snapshot.
    pub async fn run(mut self) -> Result<Snapshot, SessionError> {
        tracing::info!(
            session = %self.id,
            machine = self.interpreter.machine().id(),
            "Starting session"
        );
        let outcome = self.interpreter.start()?;
        self.apply(outcome).await;

        loop {
            if self.interpreter.is_done() {
                tracing::info!(session = %self.id, "Machine reached its final state");
                break;
            }

            let event = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    tracing::info!(session = %self.id, "Shutdown requested");
                    break;
                }
                Some(event) = self.events.recv() => event,
                () = self.handles_dropped.cancelled() => {
                    tracing::info!(session = %self.id, "All handles dropped");
                    break;
                }
            };

            self.forget(&event);
            self.interpreter.submit(event);
            while let Some(outcome) = self.interpreter.step()? {
                self.apply(outcome).await;
            }
        }

        self.teardown();
        tracing::info!(session = %self.id, "Session stopped");
        Ok(self.interpreter.snapshot())
    }

    /// Drop the cancellation token of a timer or invocation that reported
    /// back.
    fn forget(&mut self, event: &Event) {
        match event {
            Event::TimerFired { timer } => {
                self.timers.remove(timer);
            }
            Event::InvocationDone { invocation, .. } | Event::InvocationError { invocation, .. } => {
                self.invocations.remove(invocation);
            }
            Event::Signal { .. } => {}
        }
    }

    async fn apply(&mut self, outcome: StepOutcome<O>) {
        if let Some(halted) = &outcome.halted {
            tracing::warn!(session = %self.id, error = %halted, "Macrostep halted");
        }

        for effect in outcome.effects {
            match effect {
                Effect::Output(output) => self.sink.deliver(output).await,
                Effect::ScheduleTimer { timer, delay } => self.spawn_timer(timer, delay),
                Effect::CancelTimer { timer } => {
                    if let Some(token) = self.timers.remove(&timer) {
                        token.cancel();
                    }
                }
                Effect::StartInvocation {
                    invocation,
                    src,
                    input,
                } => self.spawn_invocation(invocation, src, input),
                Effect::CancelInvocation { invocation } => {
                    if let Some(token) = self.invocations.remove(&invocation) {
                        token.cancel();
                    }
                }
            }
        }

        self.snapshots.send_replace(self.interpreter.snapshot());
    }

    fn spawn_timer(&mut self, timer: TimerId, delay: Duration) {
        let token = self.shutdown.child_token();
        self.timers.insert(timer, token.clone());
        let tx = self.completions.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if tx.send(Event::timer_fired(timer)).await.is_err() {
                        tracing::debug!(%timer, "Session gone before timer fired");
                    }
                }
            }
        });
    }

    fn spawn_invocation(&mut self, invocation: InvocationId, src: String, input: Value) {
        let tx = self.completions.clone();
        let Some(handler) = self.services.get(&src).cloned() else {
            let error = SessionError::MissingHandler(src);
            tracing::warn!(session = %self.id, %invocation, %error, "Cannot start invocation");
            let event = Event::invocation_error(invocation, error.to_string());
            // The session is the only reader, so it must not wait on its own queue.
            tokio::spawn(async move {
                if tx.send(event).await.is_err() {
                    tracing::debug!(%invocation, "Session gone before invocation failed");
                }
            });
            return;
        };

        let token = self.shutdown.child_token();
        self.invocations.insert(invocation, token.clone());
        tracing::debug!(session = %self.id, %invocation, src, "Invocation started");

        tokio::spawn(async move {
            let result = tokio::select! {
                () = token.cancelled() => return,
                result = handler.invoke(input, token.clone()) => result,
            };
            let event = match result {
                Ok(data) => Event::invocation_done(invocation, data),
                Err(error) => Event::invocation_error(invocation, error),
            };
            if tx.send(event).await.is_err() {
                tracing::debug!(%invocation, "Session gone before invocation finished");
            }
        });
    }

    fn teardown(&mut self) {
        for (_, token) in self.timers.drain() {
            token.cancel();
        }
        for (_, token) in self.invocations.drain() {
            token.cancel();
        }
        self.snapshots.send_replace(self.interpreter.snapshot());
    }
}

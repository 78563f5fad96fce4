//! The statechart interpreter.
//!
//! A pure, synchronous core: it owns the configuration, the context and the
//! event queues, and reports what must happen in the outside world as
//! [`Effect`] values. It never sleeps, spawns or performs I/O.

use super::error::InterpreterError;
use super::invocations::InvocationSupervisor;
use super::timers::TimerService;
use crate::core::{
    done_invoke, done_state, error_invoke, Context, Event, History, MacrostepRecord, NodeId, INIT,
};
use crate::effects::{Action, ActionError, ActionFailure, Effect, InvokeDef, Phase};
use crate::machine::resolver::{self, Selected};
use crate::machine::{Configuration, Machine};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Tunables of one interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterpreterOptions {
    /// Microsteps allowed in one macrostep before it is halted.
    pub max_microsteps: usize,
    /// Macrostep records kept in the history.
    pub history_capacity: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_microsteps: 1000,
            history_capacity: History::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    Running,
    /// A final child of the root was entered. Further events are ignored.
    Done,
}

/// What one macrostep did.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome<O> {
    /// Name of the event processed, after translation of timer and
    /// invocation completions.
    pub event: String,
    /// Whether any transition fired.
    pub transitioned: bool,
    pub microsteps: usize,
    /// Effects in the order they were produced.
    pub effects: Vec<Effect<O>>,
    /// Guard and action errors, in the order they occurred.
    pub failures: Vec<ActionFailure>,
    /// Set when the macrostep was stopped early.
    pub halted: Option<InterpreterError>,
}

impl<O> StepOutcome<O> {
    fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            transitioned: false,
            microsteps: 0,
            effects: Vec::new(),
            failures: Vec::new(),
            halted: None,
        }
    }

    /// Domain outputs among the effects.
    pub fn outputs(&self) -> impl Iterator<Item = &O> {
        self.effects.iter().filter_map(Effect::as_output)
    }

    fn absorb(&mut self, other: StepOutcome<O>) {
        self.transitioned |= other.transitioned;
        self.microsteps += other.microsteps;
        self.effects.extend(other.effects);
        self.failures.extend(other.failures);
        if other.halted.is_some() {
            self.halted = other.halted;
        }
    }
}

/// Read-only view of an interpreter, handed to observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Nested state value, e.g. `{"dm": {"menu": "ask"}, "asrtts": "idle"}`.
    pub value: Value,
    /// Paths of the active leaves in document order.
    pub leaves: Vec<String>,
    pub context: Context,
    pub done: bool,
}

impl Snapshot {
    /// Whether the state at `path` is active.
    pub fn matches(&self, path: &str) -> bool {
        self.leaves.iter().any(|leaf| {
            leaf == path
                || leaf
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Executes a [`Machine`] one event at a time.
///
/// # Example
///
/// ```rust
/// use parley::builder::{MachineBuilder, StateBuilder};
/// use parley::core::Event;
/// use parley::runtime::{Interpreter, InterpreterOptions};
/// use std::sync::Arc;
///
/// let machine = MachineBuilder::<()>::new("root")
///     .state(StateBuilder::new("idle").on("click", "init"))
///     .state(StateBuilder::new("init"))
///     .build()
///     .unwrap();
///
/// let mut interpreter = Interpreter::new(Arc::new(machine), InterpreterOptions::default());
/// interpreter.start().unwrap();
/// assert!(interpreter.matches("idle"));
///
/// interpreter.send(Event::new("click")).unwrap();
/// assert!(interpreter.matches("init"));
/// ```
pub struct Interpreter<O> {
    machine: Arc<Machine<O>>,
    options: InterpreterOptions,
    status: Status,
    configuration: Configuration,
    context: Context,
    external: VecDeque<Event>,
    internal: VecDeque<Event>,
    timers: TimerService,
    invocations: InvocationSupervisor,
    history: History,
}

impl<O> Interpreter<O> {
    pub fn new(machine: Arc<Machine<O>>, options: InterpreterOptions) -> Self {
        let context = machine.initial_context().clone();
        Self {
            machine,
            options,
            status: Status::NotStarted,
            configuration: Configuration::new(),
            context,
            external: VecDeque::new(),
            internal: VecDeque::new(),
            timers: TimerService::new(),
            invocations: InvocationSupervisor::new(),
            history: History::with_capacity(options.history_capacity),
        }
    }

    /// Enter the initial configuration and run to a stable state.
    pub fn start(&mut self) -> Result<StepOutcome<O>, InterpreterError> {
        if self.status != Status::NotStarted {
            return Err(InterpreterError::AlreadyStarted);
        }
        self.status = Status::Running;

        let machine = Arc::clone(&self.machine);
        let event = Event::new(INIT);
        let mut outcome = StepOutcome::new(INIT);
        outcome.microsteps = 1;
        outcome.transitioned = true;

        for id in resolver::entry_set(&machine, None, &[]) {
            self.enter_state(&machine, id, &event, &mut outcome);
        }
        self.drain(&machine, event, &mut outcome);

        info!(
            machine = machine.id(),
            leaves = ?self.configuration.leaf_paths(&machine),
            "interpreter started"
        );
        self.record(Vec::new(), &outcome);
        Ok(outcome)
    }

    /// Enqueue an external event.
    pub fn submit(&mut self, event: Event) {
        self.external.push_back(event);
    }

    /// Process the next external event as one macrostep.
    ///
    /// Returns `None` when the external queue is empty.
    pub fn step(&mut self) -> Result<Option<StepOutcome<O>>, InterpreterError> {
        if self.status == Status::NotStarted {
            return Err(InterpreterError::NotStarted);
        }
        let Some(event) = self.external.pop_front() else {
            return Ok(None);
        };

        let mut outcome = StepOutcome::new(event.name());
        if self.status == Status::Done {
            debug!(event = %event, "interpreter is done, event ignored");
            return Ok(Some(outcome));
        }
        let Some(event) = self.translate(event) else {
            return Ok(Some(outcome));
        };
        outcome.event = event.name().to_string();

        let before = self.configuration.leaf_paths(&self.machine);
        let machine = Arc::clone(&self.machine);
        self.macrostep(&machine, event, &mut outcome);
        if outcome.transitioned {
            self.record(before, &outcome);
        }
        Ok(Some(outcome))
    }

    /// Submit `event` and process every queued external event.
    pub fn send(&mut self, event: Event) -> Result<StepOutcome<O>, InterpreterError> {
        let mut total = StepOutcome::new(event.name());
        self.submit(event);
        while let Some(outcome) = self.step()? {
            total.absorb(outcome);
        }
        Ok(total)
    }

    pub fn machine(&self) -> &Arc<Machine<O>> {
        &self.machine
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    pub fn invocations(&self) -> &InvocationSupervisor {
        &self.invocations
    }

    /// External events waiting to be processed.
    pub fn pending_events(&self) -> usize {
        self.external.len()
    }

    /// Whether the state at `path` is active.
    pub fn matches(&self, path: &str) -> bool {
        self.configuration.matches(&self.machine, path)
    }

    pub fn leaves(&self) -> Vec<String> {
        self.configuration.leaf_paths(&self.machine)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            value: self.configuration.value(&self.machine),
            leaves: self.leaves(),
            context: self.context.clone(),
            done: self.is_done(),
        }
    }

    /// Turn runtime completions into the events the machine reacts to.
    /// Completions that are no longer live are absorbed.
    fn translate(&mut self, event: Event) -> Option<Event> {
        match event {
            Event::TimerFired { timer } => {
                let fired = self.timers.fire(timer);
                if fired.is_none() {
                    debug!(%timer, "stale timer absorbed");
                }
                fired
            }
            Event::InvocationDone { invocation, data } => match self.invocations.settle(invocation) {
                Some(pending) => Some(Event::with_data(done_invoke(&pending.src), data)),
                None => {
                    debug!(%invocation, "stale invocation result absorbed");
                    None
                }
            },
            Event::InvocationError { invocation, error } => {
                match self.invocations.settle(invocation) {
                    Some(pending) => Some(Event::with_data(
                        error_invoke(&pending.src),
                        json!({ "message": error }),
                    )),
                    None => {
                        debug!(%invocation, %error, "stale invocation error absorbed");
                        None
                    }
                }
            }
            signal @ Event::Signal { .. } => Some(signal),
        }
    }

    fn macrostep(&mut self, machine: &Machine<O>, event: Event, outcome: &mut StepOutcome<O>) {
        let selected = self.select(machine, &event, false, outcome);
        if selected.is_empty() {
            debug!(event = %event, "no enabled transition, event discarded");
            return;
        }
        self.microstep(machine, selected, &event, outcome);
        self.drain(machine, event, outcome);
    }

    /// Take eventless transitions and raised events until neither applies.
    fn drain(&mut self, machine: &Machine<O>, mut current: Event, outcome: &mut StepOutcome<O>) {
        loop {
            if self.status == Status::Done {
                self.internal.clear();
                break;
            }
            if outcome.microsteps >= self.options.max_microsteps {
                error!(
                    event = %outcome.event,
                    limit = self.options.max_microsteps,
                    "microstep limit reached, macrostep halted"
                );
                self.internal.clear();
                outcome.halted = Some(InterpreterError::MicrostepLimit {
                    event: outcome.event.clone(),
                    limit: self.options.max_microsteps,
                });
                break;
            }

            let eventless = self.select(machine, &current, true, outcome);
            if !eventless.is_empty() {
                self.microstep(machine, eventless, &current, outcome);
                continue;
            }

            let Some(next) = self.internal.pop_front() else {
                break;
            };
            let selected = self.select(machine, &next, false, outcome);
            if selected.is_empty() {
                debug!(event = %next, "raised event discarded");
            } else {
                self.microstep(machine, selected, &next, outcome);
            }
            current = next;
        }
    }

    fn select<'m>(
        &self,
        machine: &'m Machine<O>,
        event: &Event,
        eventless: bool,
        outcome: &mut StepOutcome<O>,
    ) -> Vec<Selected<'m, O>> {
        let mut errors = Vec::new();
        let selected = resolver::resolve(
            machine,
            &self.configuration,
            &self.context,
            event,
            eventless,
            &mut errors,
        );
        for e in errors {
            let state = machine.path(e.source).to_string();
            warn!(
                state = %state,
                guard = %e.error.guard,
                error = %e.error.error,
                "guard failed, treated as false"
            );
            outcome.failures.push(ActionFailure {
                state,
                phase: Phase::Guard,
                error: e.error.error,
            });
        }
        selected
    }

    fn microstep(
        &mut self,
        machine: &Machine<O>,
        selected: Vec<Selected<'_, O>>,
        event: &Event,
        outcome: &mut StepOutcome<O>,
    ) {
        outcome.microsteps += 1;
        outcome.transitioned = true;

        let exits: BTreeSet<NodeId> = selected
            .iter()
            .flat_map(|s| s.exits.iter().copied())
            .collect();
        let exit_order = resolver::exit_order(machine, &exits);
        for id in &exit_order {
            self.exit_state(machine, *id, event, outcome);
        }

        for s in &selected {
            let source = machine.path(s.transition.source);
            self.run_block(
                &s.candidate.actions,
                event,
                s.domain,
                source,
                Phase::Transition,
                outcome,
            );
        }

        let mut entries = BTreeSet::new();
        for s in selected.iter().filter(|s| !s.is_targetless()) {
            entries.extend(resolver::entry_set(machine, Some(s.domain), &s.candidate.targets));
        }
        for id in &entries {
            self.enter_state(machine, *id, event, outcome);
        }

        debug!(
            event = %event,
            exited = ?exit_order.iter().map(|id| machine.path(*id)).collect::<Vec<_>>(),
            entered = ?entries.iter().map(|id| machine.path(*id)).collect::<Vec<_>>(),
            "microstep"
        );
    }

    fn exit_state(&mut self, machine: &Machine<O>, id: NodeId, event: &Event, outcome: &mut StepOutcome<O>) {
        let node = machine.node(id);
        self.run_block(node.exit(), event, id, node.id(), Phase::Exit, outcome);

        for timer in self.timers.cancel_all(id) {
            outcome.effects.push(Effect::CancelTimer { timer });
        }
        if let Some(invocation) = self.invocations.cancel(id) {
            debug!(state = node.id(), %invocation, "invocation cancelled on exit");
            outcome.effects.push(Effect::CancelInvocation { invocation });
        }
        self.configuration.remove(id);
    }

    fn enter_state(&mut self, machine: &Machine<O>, id: NodeId, event: &Event, outcome: &mut StepOutcome<O>) {
        self.configuration.insert(id);
        let node = machine.node(id);
        self.run_block(node.entry(), event, id, node.id(), Phase::Entry, outcome);

        if let Some(invoke) = node.invoke() {
            self.start_invocation(id, node.id(), invoke, event, outcome);
        }
        if node.kind().is_final() {
            self.complete(machine, id);
        }
    }

    fn start_invocation(
        &mut self,
        owner: NodeId,
        state: &str,
        invoke: &InvokeDef,
        event: &Event,
        outcome: &mut StepOutcome<O>,
    ) {
        match invoke.input_for(&self.context, event) {
            Ok(input) => {
                let (invocation, replaced) = self.invocations.invoke(owner, invoke.src.as_str());
                if let Some(old) = replaced {
                    outcome.effects.push(Effect::CancelInvocation { invocation: old });
                }
                debug!(state, src = %invoke.src, %invocation, "invocation started");
                outcome.effects.push(Effect::StartInvocation {
                    invocation,
                    src: invoke.src.clone(),
                    input,
                });
            }
            Err(error) => {
                warn!(state, src = %invoke.src, %error, "invocation input failed");
                self.internal.push_back(Event::with_data(
                    error_invoke(&invoke.src),
                    json!({ "message": error.to_string() }),
                ));
                outcome.failures.push(ActionFailure {
                    state: state.to_string(),
                    phase: Phase::Invoke,
                    error,
                });
            }
        }
    }

    /// Raise completion events for the parent of a final state just entered.
    fn complete(&mut self, machine: &Machine<O>, final_state: NodeId) {
        let Some(parent) = machine.node(final_state).parent() else {
            return;
        };
        if parent == machine.root() {
            info!(machine = machine.id(), "final state reached, interpreter done");
            self.status = Status::Done;
            return;
        }
        self.internal.push_back(Event::new(done_state(machine.path(parent))));

        let Some(grandparent) = machine.node(parent).parent() else {
            return;
        };
        let grand = machine.node(grandparent);
        let all_final = grand.kind().is_parallel()
            && grand.children().iter().all(|region| {
                self.configuration
                    .active_child(machine, *region)
                    .is_some_and(|child| machine.node(child).kind().is_final())
            });
        if all_final {
            if grandparent == machine.root() {
                info!(machine = machine.id(), "all regions final, interpreter done");
                self.status = Status::Done;
            } else {
                self.internal
                    .push_back(Event::new(done_state(machine.path(grandparent))));
            }
        }
    }

    /// Run one action block. The first failing action aborts the rest.
    fn run_block(
        &mut self,
        actions: &[Action<O>],
        event: &Event,
        owner: NodeId,
        state: &str,
        phase: Phase,
        outcome: &mut StepOutcome<O>,
    ) {
        for action in actions {
            if let Err(error) = self.run_action(action, event, owner, outcome) {
                warn!(
                    state,
                    phase = ?phase,
                    action = action.kind(),
                    %error,
                    "action failed, rest of block skipped"
                );
                outcome.failures.push(ActionFailure {
                    state: state.to_string(),
                    phase,
                    error,
                });
                break;
            }
        }
    }

    fn run_action(
        &mut self,
        action: &Action<O>,
        event: &Event,
        owner: NodeId,
        outcome: &mut StepOutcome<O>,
    ) -> Result<(), ActionError> {
        match action {
            Action::Assign(compute) => {
                let updates = compute(&self.context, event)?;
                self.context = self.context.with_updates(updates);
            }
            Action::Raise(compute) => {
                let raised = compute(&self.context, event)?;
                self.internal.push_back(raised);
            }
            Action::Schedule {
                event: compute,
                delay,
                id,
            } => {
                let scheduled = compute(&self.context, event)?;
                let timer = self.timers.schedule(owner, *delay, scheduled, id.clone());
                outcome.effects.push(Effect::ScheduleTimer {
                    timer,
                    delay: *delay,
                });
            }
            Action::Cancel(send_id) => {
                for timer in self.timers.cancel_send(send_id) {
                    outcome.effects.push(Effect::CancelTimer { timer });
                }
            }
            Action::Emit(compute) => {
                let output = compute(&self.context, event)?;
                outcome.effects.push(Effect::Output(output));
            }
            Action::Log(message) => {
                info!(event = %event, "{}", message(&self.context, event));
            }
        }
        Ok(())
    }

    fn record(&mut self, from: Vec<String>, outcome: &StepOutcome<O>) {
        let to = self.configuration.leaf_paths(&self.machine);
        debug!(event = %outcome.event, ?from, ?to, microsteps = outcome.microsteps, "macrostep");
        self.history = self.history.record(MacrostepRecord {
            event: outcome.event.clone(),
            from,
            to,
            microsteps: outcome.microsteps,
            timestamp: Utc::now(),
        });
    }
}

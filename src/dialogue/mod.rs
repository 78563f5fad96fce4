//! The spoken-dialogue application.
//!
//! One parallel machine with two regions that only talk through events:
//!
//! - `dm`, the dialogue manager: menus, slot filling and knowledge lookups;
//! - `asrtts`, the controller: turn taking between listening and speaking,
//!   with a no-input timeout.
//!
//! The dialogue manager asks for speech by raising `speak` and for input by
//! raising `listen`; the controller answers with `recognised` and passes
//! `tts-finished`/`timeout` through.

pub mod controller;
pub mod grammar;
pub mod labels;
pub mod manager;

pub use labels::StatusLabel;

use crate::builder::{BuildError, MachineBuilder};
use crate::config::Settings;
use crate::core::{Context, Event};
use crate::effects::{Action, ActionError};
use crate::machine::Machine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Id of the dialogue machine, usable in absolute targets as `#root.…`.
pub const ROOT: &str = "root";

pub mod events {
    pub const CLICK: &str = "click";
    /// Final recognition result with `utterance` and `confidence`.
    pub const SPEECH_RECOGNIZED: &str = "speech-recognized";
    pub const SPEECH_START: &str = "speech-start";
    pub const SPEECH_END: &str = "speech-end";
    pub const TTS_FINISHED: &str = "tts-finished";
    pub const TTS_FAILED: &str = "tts-failed";
    pub const TTS_READY: &str = "tts-ready";
    pub const LISTEN: &str = "listen";
    /// Carries the text to say as `value`.
    pub const SPEAK: &str = "speak";
    pub const RECOGNISED: &str = "recognised";
    pub const TIMEOUT: &str = "timeout";
}

pub mod keys {
    pub const REC_RESULT: &str = "rec_result";
    pub const CHOICE: &str = "choice";
    pub const TITLE: &str = "title";
    pub const CELEB: &str = "celeb";
    pub const INFO: &str = "info";
    pub const TTS_AGENDA: &str = "tts_agenda";
    pub const AUTHORIZATION_TOKEN: &str = "authorization_token";
}

/// Invocation sources.
pub mod services {
    /// Knowledge lookup. Input `{"query": …}`, result with `AbstractText`.
    pub const KB_LOOKUP: &str = "kb_lookup";
    /// Speech vendor token fetch. Result is the token.
    pub const AUTHORIZE: &str = "authorize";
}

/// What the dialogue asks of the outside world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogueOutput {
    Speak { text: String },
    StartListening,
    StopListening,
}

/// Build the dialogue machine.
pub fn machine(settings: &Settings) -> Result<Machine<DialogueOutput>, BuildError> {
    MachineBuilder::new(ROOT)
        .parallel()
        .state(manager::region())
        .state(controller::region(settings))
        .build()
}

/// Raise `speak` with a fixed text.
pub fn say<O>(text: impl Into<String>) -> Action<O> {
    let text = text.into();
    Action::raise_with(move |_, _| Ok(speak_event(text.clone())))
}

/// Raise `speak` with a text computed from the context.
pub fn say_with<O, F>(compose: F) -> Action<O>
where
    F: Fn(&Context) -> Result<String, ActionError> + Send + Sync + 'static,
{
    Action::raise_with(move |ctx, _| compose(ctx).map(speak_event))
}

fn speak_event(text: String) -> Event {
    Event::with_data(events::SPEAK, json!({ "value": text }))
}

/// The last recognised utterance.
pub fn utterance(ctx: &Context) -> Result<&str, ActionError> {
    ctx.get(keys::REC_RESULT)
        .and_then(|result| result.get("utterance"))
        .and_then(Value::as_str)
        .ok_or_else(|| ActionError::MissingContext(keys::REC_RESULT.to_string()))
}

/// A string context value, or an error naming the key.
pub(crate) fn require_str<'c>(ctx: &'c Context, key: &str) -> Result<&'c str, ActionError> {
    ctx.get_str(key)
        .ok_or_else(|| ActionError::MissingContext(key.to_string()))
}

/// A speech result event as the recogniser delivers it.
pub fn speech_recognized(utterance: impl Into<String>, confidence: f64) -> Event {
    Event::with_data(
        events::SPEECH_RECOGNIZED,
        json!({ "utterance": utterance.into(), "confidence": confidence }),
    )
}

//! The ASR/TTS controller region (`asrtts`).
//!
//! Owns the microphone and the voice. Speech requests arrive as `speak`,
//! listening requests as `listen`; recognition results leave as
//! `recognised` after being stored under [`keys::REC_RESULT`].

use super::{events, keys, services, DialogueOutput};
use crate::builder::{Branch, StateBuilder, TransitionBuilder};
use crate::config::Settings;
use crate::effects::{Action, ActionError};

type State = StateBuilder<DialogueOutput>;

pub fn region(settings: &Settings) -> State {
    StateBuilder::new("asrtts")
        .initial("prepare")
        .state(
            StateBuilder::new("prepare")
                .invoke(services::AUTHORIZE)
                .on_done(
                    Branch::to("idle")
                        .action(Action::assign(keys::AUTHORIZATION_TOKEN, |_, event| {
                            Ok(event.data().clone())
                        }))
                        .action(Action::raise(events::TTS_READY)),
                )
                .on_error(Branch::to("fail")),
        )
        .state(
            StateBuilder::new("idle")
                .on(events::LISTEN, "recognising")
                .transition(
                    TransitionBuilder::on(events::SPEAK).to("speaking").action(
                        Action::assign(keys::TTS_AGENDA, |_, event| {
                            event
                                .data()
                                .get("value")
                                .cloned()
                                .ok_or_else(|| ActionError::MissingPayload("value".into()))
                        }),
                    ),
                ),
        )
        .state(recognising(settings))
        .state(
            StateBuilder::new("speaking")
                .entry(Action::emit(|ctx, _| {
                    ctx.get_str(keys::TTS_AGENDA)
                        .map(|text| DialogueOutput::Speak {
                            text: text.to_string(),
                        })
                        .ok_or_else(|| ActionError::MissingContext(keys::TTS_AGENDA.into()))
                }))
                .on(events::TTS_FINISHED, "idle")
                .on(events::TTS_FAILED, "fail"),
        )
        .state(StateBuilder::new("fail"))
}

fn recognising(settings: &Settings) -> State {
    StateBuilder::new("recognising")
        .initial("noinput")
        .entry(Action::emit(|_, _| Ok(DialogueOutput::StartListening)))
        .exit(Action::emit(|_, _| Ok(DialogueOutput::StopListening)))
        .transition(
            TransitionBuilder::on(events::SPEECH_RECOGNIZED)
                .to(".match")
                .action(Action::assign(keys::REC_RESULT, |_, event| {
                    if event.field_str("utterance").is_none() {
                        return Err(ActionError::MissingPayload("utterance".into()));
                    }
                    Ok(event.data().clone())
                })),
        )
        .on(events::RECOGNISED, "idle")
        .state(
            StateBuilder::new("noinput")
                .entry(
                    Action::schedule(events::TIMEOUT, settings.no_input_timeout())
                        .with_id(events::TIMEOUT),
                )
                .exit(Action::cancel(events::TIMEOUT))
                .on(events::TIMEOUT, "#root.asrtts.idle")
                .on(events::SPEECH_START, "inprogress"),
        )
        .state(StateBuilder::new("inprogress"))
        .state(StateBuilder::new("match").entry(Action::raise(events::RECOGNISED)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MachineBuilder;
    use crate::core::Event;
    use crate::dialogue::speech_recognized;
    use crate::effects::Effect;
    use crate::runtime::{Interpreter, InterpreterOptions, StepOutcome};
    use serde_json::json;
    use std::sync::Arc;

    fn controller() -> (Interpreter<DialogueOutput>, StepOutcome<DialogueOutput>) {
        let machine = MachineBuilder::new("root")
            .state(region(&Settings::default()))
            .build()
            .unwrap();
        let mut interpreter = Interpreter::new(Arc::new(machine), InterpreterOptions::default());
        let outcome = interpreter.start().unwrap();
        (interpreter, outcome)
    }

    fn ready() -> Interpreter<DialogueOutput> {
        let (mut interpreter, outcome) = controller();
        let authorize = outcome
            .effects
            .iter()
            .find_map(|effect| match effect {
                Effect::StartInvocation { invocation, src, .. } if src == services::AUTHORIZE => {
                    Some(*invocation)
                }
                _ => None,
            })
            .unwrap();
        interpreter
            .send(Event::invocation_done(authorize, json!("token-123")))
            .unwrap();
        interpreter
    }

    #[test]
    fn authorization_moves_to_idle() {
        let interpreter = ready();
        assert!(interpreter.matches("asrtts.idle"));
        assert_eq!(
            interpreter.context().get_str(keys::AUTHORIZATION_TOKEN),
            Some("token-123")
        );
    }

    #[test]
    fn speak_emits_agenda() {
        let mut interpreter = ready();

        let outcome = interpreter
            .send(Event::with_data(events::SPEAK, json!({ "value": "Hello" })))
            .unwrap();

        assert!(interpreter.matches("asrtts.speaking"));
        assert_eq!(
            outcome.outputs().collect::<Vec<_>>(),
            vec![&DialogueOutput::Speak {
                text: "Hello".into()
            }]
        );
    }

    #[test]
    fn recognition_stores_result_and_returns_to_idle() {
        let mut interpreter = ready();
        let listen = interpreter.send(Event::new(events::LISTEN)).unwrap();
        assert_eq!(
            listen.outputs().collect::<Vec<_>>(),
            vec![&DialogueOutput::StartListening]
        );

        let outcome = interpreter.send(speech_recognized("Lunch.", 0.8)).unwrap();

        assert!(interpreter.matches("asrtts.idle"));
        assert!(outcome.outputs().any(|o| *o == DialogueOutput::StopListening));
        assert_eq!(
            interpreter.context().get(keys::REC_RESULT),
            Some(&json!({ "utterance": "Lunch.", "confidence": 0.8 }))
        );
    }

    #[test]
    fn tts_failure_is_terminal_for_the_controller() {
        let mut interpreter = ready();
        interpreter
            .send(Event::with_data(events::SPEAK, json!({ "value": "Hi" })))
            .unwrap();

        interpreter.send(Event::new(events::TTS_FAILED)).unwrap();

        assert!(interpreter.matches("asrtts.fail"));
        interpreter.send(Event::new(events::LISTEN)).unwrap();
        assert!(interpreter.matches("asrtts.fail"));
    }

    #[test]
    fn failed_authorization_fails() {
        let (mut interpreter, outcome) = controller();
        let Some(Effect::StartInvocation { invocation, .. }) = outcome.effects.first() else {
            panic!("expected the authorize invocation");
        };

        interpreter
            .send(Event::invocation_error(*invocation, "401"))
            .unwrap();

        assert!(interpreter.matches("asrtts.fail"));
    }
}

//! The dialogue manager region (`dm`).

use super::grammar;
use super::{events, keys, require_str, say, say_with, services, utterance, DialogueOutput};
use crate::builder::{Branch, StateBuilder, TransitionBuilder};
use crate::core::{Context, Event, Guard};
use crate::effects::{Action, ActionError};
use serde_json::{json, Value};

const NOMATCH: &str = "Sorry, I don't know what it is. Tell me something I know.";

type State = StateBuilder<DialogueOutput>;

pub fn region() -> State {
    StateBuilder::new("dm")
        .initial("idle")
        .state(StateBuilder::new("idle").on(events::CLICK, "init"))
        .state(
            StateBuilder::new("init")
                .on(events::TTS_READY, "menu")
                .on(events::CLICK, "menu"),
        )
        .state(menu())
        .state(welcome())
        .state(information())
        .state(
            StateBuilder::new("info")
                .entry(say_with(|ctx| {
                    require_str(ctx, keys::TITLE).map(|title| format!("OK, {title}"))
                }))
                .on(events::TTS_FINISHED, "init"),
        )
        .state(get_info())
        .state(
            StateBuilder::new("failure_one")
                .entry(say_with(|ctx| {
                    require_str(ctx, keys::CELEB)
                        .map(|celeb| format!("I don't think {celeb} is a celebrity."))
                }))
                .on(events::TTS_FINISHED, "information"),
        )
        .state(
            StateBuilder::new("failure")
                .entry(say_with(|ctx| {
                    require_str(ctx, keys::CELEB).map(|celeb| {
                        format!("Sorry, there is no information on {celeb} available.")
                    })
                }))
                .on(events::TTS_FINISHED, "information"),
        )
        .state(
            StateBuilder::new("info_three")
                .entry(say_with(|ctx| {
                    require_str(ctx, keys::CELEB)
                        .map(|celeb| format!("OK, info on {celeb} available"))
                }))
                .on(events::TTS_FINISHED, "give_info"),
        )
        .state(
            StateBuilder::new("give_info")
                .entry(say_with(|ctx| require_str(ctx, keys::INFO).map(str::to_string)))
                .on(events::TTS_FINISHED, "init"),
        )
}

/// A question state: `prompt` speaks, `ask` listens, `nomatch` apologises.
/// A `timeout` from the controller asks again.
fn question(key: &str, prompt: &str, recognised: TransitionBuilder<DialogueOutput>) -> State {
    StateBuilder::new(key)
        .initial("prompt")
        .transition(recognised)
        .on(events::TIMEOUT, ".prompt")
        .state(
            StateBuilder::new("prompt")
                .entry(say(prompt))
                .on(events::TTS_FINISHED, "ask"),
        )
        .state(StateBuilder::new("ask").entry(Action::raise(events::LISTEN)))
        .state(
            StateBuilder::new("nomatch")
                .entry(say(NOMATCH))
                .on(events::TTS_FINISHED, "ask"),
        )
}

/// The grammar's `choice` entity for the last utterance.
fn choice_is(expected: &'static str) -> Guard {
    Guard::fallible(move |ctx: &Context, _: &Event| {
        Ok(grammar::entity(utterance(ctx)?, keys::CHOICE) == Some(expected))
    })
    .named(expected)
}

fn assign_entity(key: &'static str) -> Action<DialogueOutput> {
    Action::assign(key, move |ctx, _| {
        grammar::entity(utterance(ctx)?, key)
            .map(|value| json!(value))
            .ok_or_else(|| ActionError::Failed(format!("utterance has no {key}")))
    })
}

fn menu() -> State {
    question(
        "menu",
        "Do you want to book a meeting or find information about someone?",
        TransitionBuilder::on(events::RECOGNISED)
            .branch(
                Branch::to("welcome")
                    .when(choice_is("booking a meeting"))
                    .action(assign_entity(keys::CHOICE)),
            )
            .branch(
                Branch::to("information")
                    .when(choice_is("finding information"))
                    .action(assign_entity(keys::CHOICE)),
            )
            .branch(Branch::to(".nomatch")),
    )
}

fn welcome() -> State {
    let has_title = Guard::fallible(|ctx: &Context, _: &Event| {
        Ok(grammar::entity(utterance(ctx)?, keys::TITLE).is_some())
    })
    .named("has_title");

    question(
        "welcome",
        "Ok, let's create a meeting. What is it about?",
        TransitionBuilder::on(events::RECOGNISED)
            .branch(
                Branch::to("info")
                    .when(has_title)
                    .action(assign_entity(keys::TITLE)),
            )
            .branch(Branch::to(".nomatch")),
    )
}

fn information() -> State {
    let said_something = Guard::fallible(|ctx: &Context, _: &Event| {
        Ok(!grammar::normalize(utterance(ctx)?).is_empty())
    })
    .named("said_something");

    question(
        "information",
        "Ok, who do you want information about?",
        TransitionBuilder::on(events::RECOGNISED)
            .branch(
                Branch::to("get_info")
                    .when(said_something)
                    .action(Action::assign(keys::CELEB, |ctx, _| {
                        Ok(json!(grammar::normalize(utterance(ctx)?)))
                    })),
            )
            .branch(Branch::to(".nomatch")),
    )
}

fn abstract_text(event: &Event) -> Option<&str> {
    event
        .data()
        .get("AbstractText")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

fn get_info() -> State {
    let found = Guard::new(|_: &Context, event: &Event| abstract_text(event).is_some())
        .named("has_abstract");

    StateBuilder::new("get_info")
        .invoke_with(services::KB_LOOKUP, |ctx, _| {
            let celeb = require_str(ctx, keys::CELEB)?;
            Ok(json!({ "query": celeb }))
        })
        .on_done(
            Branch::to("info_three")
                .when(found)
                .action(Action::assign(keys::INFO, |_, event| {
                    abstract_text(event)
                        .map(|text| json!(text))
                        .ok_or_else(|| ActionError::MissingPayload("AbstractText".into()))
                })),
        )
        .on_done(Branch::to("failure_one"))
        .on_error(Branch::to("failure"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MachineBuilder;
    use crate::effects::Phase;
    use crate::runtime::{Interpreter, InterpreterOptions};
    use std::sync::Arc;

    /// The manager alone, with the controller's role played by the test.
    fn manager() -> Interpreter<DialogueOutput> {
        let machine = MachineBuilder::new("root").state(region()).build().unwrap();
        let mut interpreter = Interpreter::new(Arc::new(machine), InterpreterOptions::default());
        interpreter.start().unwrap();
        interpreter
    }

    #[test]
    fn clicks_lead_to_menu_prompt() {
        let mut dm = manager();
        assert!(dm.matches("dm.idle"));

        dm.send(Event::new(events::CLICK)).unwrap();
        dm.send(Event::new(events::CLICK)).unwrap();

        assert!(dm.matches("dm.menu.prompt"));
    }

    #[test]
    fn recognised_without_result_falls_back_to_nomatch() {
        let mut dm = manager();
        dm.send(Event::new(events::CLICK)).unwrap();
        dm.send(Event::new(events::CLICK)).unwrap();

        // Nothing stored a recognition result, so both guards fail and the
        // fallback branch is taken.
        let outcome = dm.send(Event::new(events::RECOGNISED)).unwrap();

        assert!(dm.matches("dm.menu.nomatch"));
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures.iter().all(|f| f.phase == Phase::Guard));
    }

    #[test]
    fn timeout_reprompts() {
        let mut dm = manager();
        dm.send(Event::new(events::CLICK)).unwrap();
        dm.send(Event::new(events::CLICK)).unwrap();
        dm.send(Event::new(events::TTS_FINISHED)).unwrap();
        assert!(dm.matches("dm.menu.ask"));

        dm.send(Event::new(events::TIMEOUT)).unwrap();
        assert!(dm.matches("dm.menu.prompt"));
    }

    #[test]
    fn abstract_text_must_be_non_empty() {
        let empty = Event::with_data("done.invoke.kb_lookup", json!({ "AbstractText": "" }));
        let full = Event::with_data("done.invoke.kb_lookup", json!({ "AbstractText": "A singer" }));

        assert_eq!(abstract_text(&empty), None);
        assert_eq!(abstract_text(&full), Some("A singer"));
        assert_eq!(abstract_text(&Event::new("x")), None);
    }
}

//! Console Dialogue
//!
//! Runs the full dialogue machine in a terminal. Typed lines stand in for
//! the speech recogniser and printed lines for the voice.
//!
//! Commands:
//! - `click` presses the talk button
//! - `quit` ends the session
//! - anything else is heard as an utterance
//!
//! Run with: cargo run --example console
//! Set RUST_LOG=parley=debug to watch the interpreter.

use async_trait::async_trait;
use parley::config::Settings;
use parley::core::Event;
use parley::dialogue::{self, events, services, speech_recognized, DialogueOutput, StatusLabel};
use parley::runtime::{ChannelSink, InvocationHandler, Services, Session};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct DemoAuthorizer;

#[async_trait]
impl InvocationHandler for DemoAuthorizer {
    async fn invoke(&self, _input: Value, _cancel: CancellationToken) -> Result<Value, String> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(json!("demo-token"))
    }
}

/// A tiny offline knowledge base.
struct DemoKnowledgeBase;

#[async_trait]
impl InvocationHandler for DemoKnowledgeBase {
    async fn invoke(&self, input: Value, cancel: CancellationToken) -> Result<Value, String> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or("lookup needs a query")?;

        tokio::select! {
            () = cancel.cancelled() => return Err("lookup cancelled".to_string()),
            () = tokio::time::sleep(Duration::from_millis(500)) => {}
        }

        let text = match query {
            "ada lovelace" => "Ada Lovelace was an English mathematician and writer.",
            "alan turing" => "Alan Turing was an English mathematician and computer scientist.",
            "grace hopper" => "Grace Hopper was an American computer scientist.",
            "nobody" => return Err("lookup service unavailable".to_string()),
            _ => "",
        };
        Ok(json!({ "AbstractText": text }))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=info")),
        )
        .init();

    println!("=== Console Dialogue ===\n");
    println!("Type 'click' to start, 'quit' to leave. Everything else is speech.\n");

    let settings = Settings::from_env().unwrap();
    let machine = Arc::new(dialogue::machine(&settings).unwrap());
    let services = Services::from([
        (
            services::AUTHORIZE.to_string(),
            Arc::new(DemoAuthorizer) as Arc<dyn InvocationHandler>,
        ),
        (
            services::KB_LOOKUP.to_string(),
            Arc::new(DemoKnowledgeBase) as Arc<dyn InvocationHandler>,
        ),
    ]);
    let (sink, mut outputs) = ChannelSink::new();
    let (session, handle) = Session::new(machine, services, Arc::new(sink), &settings);
    let session = tokio::spawn(session.run());

    // The "voice": print what would be spoken and report it finished.
    let voice = handle.clone();
    tokio::spawn(async move {
        while let Some(output) = outputs.recv().await {
            match output {
                DialogueOutput::Speak { text } => {
                    println!("system: {text}");
                    if voice.send(Event::new(events::TTS_FINISHED)).await.is_err() {
                        break;
                    }
                }
                DialogueOutput::StartListening => println!("  (listening)"),
                DialogueOutput::StopListening => println!("  (stopped listening)"),
            }
        }
    });

    let mut snapshots = handle.subscribe();
    tokio::spawn(async move {
        let mut shown = StatusLabel::Blank;
        while snapshots.changed().await.is_ok() {
            let label = StatusLabel::for_snapshot(&snapshots.borrow_and_update());
            if label != shown && label != StatusLabel::Blank {
                println!("  [{label}]");
            }
            shown = label;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let event = match line.trim() {
            "quit" => break,
            "click" => Event::new(events::CLICK),
            heard => speech_recognized(heard, 1.0),
        };
        if handle.send(event).await.is_err() {
            break;
        }
    }

    handle.shutdown();
    let last = session.await.unwrap().unwrap();
    println!("\nFinal states: {}", last.leaves.join(", "));
    println!("\n=== Session Complete ===");
}

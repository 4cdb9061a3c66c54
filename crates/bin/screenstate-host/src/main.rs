//! # screenstate-host — interactive screen host
//!
//! Composition root that wires the reactive core to its adapters and drives
//! one screen from stdin.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and install logging
//! - Construct the shared global store and the screen store over the
//!   in-memory storage adapter
//! - Load the screen document and start the trigger engine with the
//!   store-action dispatcher
//! - Fire `on_open`, then execute line commands until `quit` or EOF
//! - Shut down cleanly: stop the engine, dispose the stores
//!
//! ## Usage
//! ```text
//! screenstate-host [--config <path>] <screen.json>
//! ```
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod command;
mod config;
mod document;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use screenstate_adapter_storage_memory::InMemoryVariableStorage;
use screenstate_adapter_store_actions::StoreActionDispatcher;
use screenstate_app::trigger_engine::TriggerEngine;
use screenstate_app::variable_store::VariableStore;
use screenstate_domain::id::{ScreenId, TriggerId};
use screenstate_domain::trigger::ScreenEventType;
use screenstate_domain::variable::WritePolicy;

use command::Command;
use config::{Config, LoggingConfig};
use document::ScreenDocument;

type Storage = Arc<InMemoryVariableStorage>;
type Store = VariableStore<Storage>;
type Engine = TriggerEngine<Storage, StoreActionDispatcher<Storage>>;

struct Args {
    config: String,
    document: PathBuf,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut config = config::DEFAULT_PATH.to_string();
        let mut document = None;
        while let Some(arg) = args.next() {
            if arg == "--config" {
                config = args.next().context("--config expects a path")?;
            } else if document.is_none() {
                document = Some(PathBuf::from(arg));
            } else {
                anyhow::bail!("unexpected argument `{arg}`");
            }
        }
        let document = document.context("usage: screenstate-host [--config <path>] <screen.json>")?;
        Ok(Self { config, document })
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    let config = Config::load(&args.config).context("loading configuration")?;
    init_tracing(&config.logging);

    let document = ScreenDocument::load(&args.document)
        .with_context(|| format!("loading {}", args.document.display()))?;
    let screen_id = document.screen_id.clone();

    // Stores
    let storage: Storage = Arc::new(InMemoryVariableStorage::default());
    let global = VariableStore::builder(Arc::clone(&storage))
        .config(config.store.clone())
        .build();
    let store = VariableStore::builder(storage)
        .config(config.store.clone())
        .screen(screen_id.clone())
        .global(&global)
        .build();

    // Engine
    let engine = TriggerEngine::new(&store, StoreActionDispatcher::new(&store), screen_id.clone());
    let mut failures = engine.subscribe_failures();
    tokio::spawn(async move {
        while let Ok(failure) = failures.recv().await {
            println!("trigger {} failed: {}", failure.trigger_id, describe(&*failure.error));
        }
    });
    engine.start(document.triggers)?;
    tracing::info!(%screen_id, "screen opened");
    fire(&engine, ScreenEventType::OnOpen).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => execute(command, &store, &engine, &screen_id).await,
            Err(err) => println!("error: {}", describe(&err)),
        }
    }

    engine.stop();
    store.dispose();
    global.dispose();
    tracing::info!(%screen_id, "screen closed");
    Ok(())
}

async fn fire(engine: &Engine, event: ScreenEventType) {
    match engine.on_event(event).await {
        Ok(fired) => print_fired(event, &fired),
        Err(err) => println!("error: {}", describe(&err)),
    }
}

/// Render an error with its whole source chain.
fn describe(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn print_fired(event: ScreenEventType, fired: &[TriggerId]) {
    if fired.is_empty() {
        println!("{event}: no trigger fired");
    } else {
        let ids: Vec<&str> = fired.iter().map(TriggerId::as_str).collect();
        println!("{event}: fired {}", ids.join(", "));
    }
}

async fn execute(command: Command, store: &Store, engine: &Engine, screen_id: &ScreenId) {
    let screen = Some(screen_id);
    let result = match command {
        Command::Set {
            slot,
            value,
            policy,
            ttl_millis,
        } => {
            store
                .set(&slot.key, value, slot.scope, screen, policy, ttl_millis)
                .await
        }
        Command::Increment { slot, delta } => store
            .increment(&slot.key, delta, slot.scope, screen, WritePolicy::InMemory)
            .await
            .map(|value| println!("{}:{} = {value}", slot.scope, slot.key)),
        Command::Remove(slot) => store.remove(&slot.key, slot.scope, screen).await,
        Command::Get(slot) => {
            match store.get(&slot.key, slot.scope, screen).await {
                Some(value) => println!("{}:{} = {value}", slot.scope, slot.key),
                None => println!("{}:{} is not set", slot.scope, slot.key),
            }
            Ok(())
        }
        Command::Event(event) => {
            fire(engine, event).await;
            Ok(())
        }
        Command::Sync => store.sync_from_persistent(screen).await,
        Command::Quit => Ok(()),
    };
    if let Err(err) = result {
        println!("error: {}", describe(&err));
    }
}

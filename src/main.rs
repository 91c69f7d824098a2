//! Replay driver: feeds a JSON-lines script of auth and account events
//! through the app wired to in-memory collaborators and prints what the
//! user would have seen.
//!
//! ```text
//! {"op":"account","id":"u1","data":{"isBlocked":false,"role":"user"}}
//! {"op":"login","id":"u1"}
//! {"op":"visit","path":"/orders"}
//! {"op":"account","id":"u1","data":{"isBlocked":true}}
//! {"op":"logout"}
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use session_gate::app::{App, Rendered, RunningApp};
use session_gate::config::{ConfigError, MonitorConfig};
use session_gate::memory::{MemoryAccountStore, MemoryAuth, MemoryUi, UiEffect};
use session_gate::providers::Collaborators;
use session_gate::routes::storefront::storefront;
use session_gate::routes::table::RouteTableError;
use session_gate::session::UserId;

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("route table: {0}")]
    Routes(#[from] RouteTableError),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Parser, Debug)]
#[command(name = "session-gate", about = "Replay auth and account events against the storefront routes")]
struct Cli {
    /// JSON-lines script; `-` reads stdin.
    #[arg(long, env = "SESSION_GATE_SCRIPT", default_value = "-")]
    script: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Login { id: UserId },
    Logout,
    Account { id: UserId, data: Value },
    DeleteAccount { id: UserId },
    Visit { path: String },
}

struct World {
    auth: MemoryAuth,
    accounts: MemoryAccountStore,
    ui: MemoryUi,
    collection: String,
}

#[tokio::main]
async fn main() -> Result<(), ReplayError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();

    let config = MonitorConfig::from_env()?;
    let world = World {
        auth: MemoryAuth::new(),
        accounts: MemoryAccountStore::new(),
        ui: MemoryUi::new(),
        collection: config.account_collection.clone(),
    };
    let collaborators = Collaborators {
        auth: Arc::new(world.auth.clone()),
        accounts: Arc::new(world.accounts.clone()),
        notifier: Arc::new(world.ui.clone()),
        navigator: Arc::new(world.ui.clone()),
    };
    let app = App::builder(collaborators, storefront()?).config(config).start().await;

    let reader: Box<dyn BufRead> = if cli.script == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&cli.script).map_err(|source| ReplayError::Io { context: "open script", source })?;
        Box::new(BufReader::new(file))
    };

    let mut steps = 0_usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ReplayError::Io { context: "read script", source })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step: Step =
            serde_json::from_str(trimmed).map_err(|source| ReplayError::Parse { line: index + 1, source })?;
        run_step(&app, &world, step).await;
        steps = steps.saturating_add(1);
    }

    app.shutdown().await;
    eprintln!("replay complete: steps={steps}");
    Ok(())
}

async fn run_step(app: &RunningApp<&'static str>, world: &World, step: Step) {
    match step {
        Step::Login { id } => world.auth.sign_in(id),
        Step::Logout => world.auth.sign_out_locally(),
        Step::Account { id, data } => world.accounts.put(&world.collection, id, data),
        Step::DeleteAccount { id } => world.accounts.delete(&world.collection, id),
        Step::Visit { path } => {
            app.settled().await;
            let outcome = match app.render(&path) {
                Rendered::Page(page) => format!("page {page}"),
                Rendered::Pending => "pending".to_owned(),
                Rendered::Redirected(to) => format!("redirect {to}"),
                Rendered::NotFound(Some(page)) => format!("not found ({page})"),
                Rendered::NotFound(None) => "not found".to_owned(),
            };
            println!("visit {path} -> {outcome}");
        }
    }
    app.settled().await;

    for effect in world.ui.take() {
        match effect {
            UiEffect::Notice { message, duration } => println!("notice ({}ms): {message}", duration.as_millis()),
            UiEffect::Navigate(path) => println!("navigate {path}"),
        }
    }
}

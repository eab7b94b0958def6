use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;

mod config;
mod error;
mod llm_manager;
mod logger;
mod providers;
mod server;
mod storage;
mod suggest;
mod task;
#[cfg(test)]
mod test_support;

use config::Config;
use llm_manager::LLMManager;
use storage::FileStore;
use suggest::{SuggestRequest, Suggester};
use task::{FilterMode, MAX_TASK_TEXT_CHARS, Task, TaskStore};

#[derive(Parser)]
#[command(name = "task_suggest", about = "Task list with LLM-assisted goal decomposition")]
struct Args {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log raw provider traffic
    #[arg(long, global = true)]
    debug: bool,
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the suggestion HTTP endpoint
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Add a task
    Add {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// List tasks
    List {
        /// all, active or done
        #[arg(short, long, default_value = "all")]
        filter: FilterMode,
    },
    /// Flip a task between active and done
    Toggle { id: String },
    /// Delete a task
    Remove { id: String },
    /// Delete every completed task
    ClearCompleted,
    /// Ask the model to break a goal into tasks
    Suggest {
        #[arg(required = true)]
        goal: Vec<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Add the suggestions to the task list
        #[arg(long)]
        accept: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logger::init(args.verbose, args.debug);

    let mut config = Config::load_with_env(&args.config)?;

    match args.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::start_server(Arc::new(config))
                .await
                .context("Suggestion server failed")
        }
        Command::Add { text } => {
            let mut store = open_store(&config);
            let text = clamp_text(&text.join(" "));
            match store.add(&text).context("Failed to save tasks")? {
                Some(task) => println!("Added {}", short_id(&task.id)),
                None => println!("Nothing to add"),
            }
            Ok(())
        }
        Command::List { filter } => {
            let store = open_store(&config);
            for task in store.filter(filter) {
                println!("{}", format_task(task));
            }
            let (total, active, done) = store.counts();
            println!("{} task(s): {} active, {} done", total, active, done);
            Ok(())
        }
        Command::Toggle { id } => {
            let mut store = open_store(&config);
            let id = resolve_id(store.tasks(), &id)?;
            store.toggle(&id).context("Failed to save tasks")?;
            Ok(())
        }
        Command::Remove { id } => {
            let mut store = open_store(&config);
            let id = resolve_id(store.tasks(), &id)?;
            store.remove(&id).context("Failed to save tasks")?;
            Ok(())
        }
        Command::ClearCompleted => {
            let mut store = open_store(&config);
            let removed = store.clear_completed().context("Failed to save tasks")?;
            println!("Removed {} completed task(s)", removed);
            Ok(())
        }
        Command::Suggest { goal, api_key, model, accept } => {
            let config = Arc::new(config);
            let suggester = Suggester::new(Arc::new(LLMManager::new(config.clone())));
            let request = SuggestRequest {
                prompt: goal.join(" "),
                api_key,
                model,
            };
            let tasks = suggester.suggest(&request).await.map_err(|e| match e.detail() {
                Some(detail) => anyhow!("{} ({})", e, detail),
                None => anyhow!("{}", e),
            })?;

            if tasks.is_empty() {
                println!("No usable tasks in the model's reply");
                return Ok(());
            }
            for task in &tasks {
                println!("- {}", task);
            }
            if accept {
                let mut store = open_store(&config);
                let clamped: Vec<String> = tasks.iter().map(|t| clamp_text(t)).collect();
                let added = store.add_many(&clamped).context("Failed to save tasks")?;
                info!("Accepted {} suggestion(s)", added);
                println!("Added {} task(s)", added);
            }
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> TaskStore<FileStore> {
    TaskStore::load(FileStore::new(config.data_dir()))
}

fn clamp_text(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_TASK_TEXT_CHARS {
        return text.to_string();
    }
    warn!("Task text longer than {} characters was truncated", MAX_TASK_TEXT_CHARS);
    text.chars().take(MAX_TASK_TEXT_CHARS).collect()
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_task(task: &Task) -> String {
    let mark = if task.done { "x" } else { " " };
    let created = chrono::DateTime::from_timestamp_millis(task.created_at)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    format!("[{}] {}  {}  {}", mark, short_id(&task.id), task.text, created)
}

/// Accept a full id or a unique prefix of one.
fn resolve_id(tasks: &[Task], prefix: &str) -> Result<String> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        bail!("Task id is required");
    }
    let mut matches = tasks.iter().filter(|t| t.id.starts_with(prefix));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task.id.clone()),
        (Some(_), Some(_)) => Err(anyhow!("Task id '{}' is ambiguous", prefix)),
        (None, _) => Err(anyhow!("No task with id '{}'", prefix)),
    }
}

//! Terminal to-do list on top of the tasks peer.
//!
//! Without a subcommand it opens the interactive list; the subcommands are
//! for scripts (seeding data, smoke tests).

mod app;
mod term;
mod ui;

use crate::app::App;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use quickstart_tasks::log::{self, LogConfig, LogLevel};
use quickstart_tasks::{PeerConfig, TasksPeer};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tasks-tui", version, about = "Shared to-do list")]
struct Cli {
    /// App id from the sync service portal
    #[arg(long, env = "SYNC_APP_ID")]
    app_id: String,

    /// Online playground token
    #[arg(long, env = "SYNC_PLAYGROUND_TOKEN", hide_env_values = true)]
    token: String,

    /// Persist the store in this directory instead of memory
    #[arg(long, env = "SYNC_PERSISTENCE_DIR", value_name = "DIR")]
    persistence_dir: Option<PathBuf>,

    /// Log file (defaults to tasks-tui.log in the temp directory)
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    #[arg(long)]
    no_cloud_sync: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the tasks
    List {
        #[arg(long)]
        include_deleted: bool,
    },
    /// Add a task and print its id
    Add {
        title: String,
        #[arg(long)]
        done: bool,
    },
    /// Run a query and print the JSON result
    Query { dql: String },
    /// Remove soft-deleted tasks from the local store
    Evict,
}

impl Cli {
    fn peer_config(&self) -> PeerConfig {
        let mut config = PeerConfig::new(&self.app_id, &self.token);
        config.enable_cloud_sync = !self.no_cloud_sync;
        config.persistence_dir = self.persistence_dir.clone();
        config
    }

    fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            file: Some(
                self.log
                    .clone()
                    .unwrap_or_else(|| std::env::temp_dir().join("tasks-tui.log")),
            ),
            stderr: false,
            env_filter: true,
            ..LogConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    log::init(cli.log_config()).context("failed to initialize logging")?;
    tracing::info!(version = TasksPeer::sdk_version(), "starting tasks-tui");

    let peer = TasksPeer::new(cli.peer_config()).context("failed to start tasks peer")?;

    match cli.command {
        None => run_interactive(&peer).await,
        Some(command) => run_command(&peer, command),
    }
}

fn run_command(peer: &TasksPeer, command: Command) -> Result<()> {
    match command {
        Command::List { include_deleted } => {
            for task in peer.get_tasks(include_deleted)? {
                println!("{}", task);
            }
        }
        Command::Add { title, done } => {
            println!("{}", peer.add_task(&title, done)?);
        }
        Command::Query { dql } => {
            let json: serde_json::Value = serde_json::from_str(&peer.execute_dql_query(&dql)?)?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::Evict => {
            println!("evicted {} tasks", peer.evict_deleted_tasks()?);
        }
    }
    Ok(())
}

async fn run_interactive(peer: &TasksPeer) -> Result<()> {
    peer.start_sync().context("failed to start sync")?;

    // Observer callbacks run on whichever thread mutated the store; the
    // stream hands each snapshot back to this loop.
    let mut snapshots = peer.observe_tasks()?;
    let mut events = EventStream::new();
    let mut app = App::new(peer.is_sync_active());

    let (mut terminal, _guard) = term::init()?;

    while !app.should_quit() {
        terminal.draw(|frame| ui::draw(frame, &app))?;

        tokio::select! {
            Some(tasks) = snapshots.next() => {
                tracing::debug!(count = tasks.len(), "tasks snapshot");
                app.set_tasks(tasks);
            }
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => app.handle_key(peer, key),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("failed to read terminal event"),
                None => break,
            },
        }
    }

    snapshots.cancel();
    tracing::info!("quitting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["tasks-tui", "--app-id", "app", "--token", "token"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_configs() {
        let cli = parse(&["--no-cloud-sync", "--persistence-dir", "/tmp/tasks", "--log-level", "debug"]);
        let config = cli.peer_config();
        assert_eq!(config.app_id, "app");
        assert!(!config.enable_cloud_sync);
        assert_eq!(config.persistence_dir, Some(PathBuf::from("/tmp/tasks")));

        let log = cli.log_config();
        assert_eq!(log.level, LogLevel::Debug);
        assert!(!log.stderr);
        assert!(log.file.unwrap().ends_with("tasks-tui.log"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn subcommands() {
        let cli = parse(&["add", "Buy milk", "--done"]);
        assert!(matches!(
            cli.command,
            Some(Command::Add { ref title, done: true }) if title == "Buy milk"
        ));

        let cli = parse(&["list", "--include-deleted"]);
        assert!(matches!(cli.command, Some(Command::List { include_deleted: true })));

        let cli = parse(&["--log", "/tmp/custom.log", "evict"]);
        assert_eq!(cli.log_config().file, Some(PathBuf::from("/tmp/custom.log")));
        assert!(matches!(cli.command, Some(Command::Evict)));
    }

    #[test]
    fn scripted_commands_against_persistent_store() {
        let dir = tempfile::tempdir().unwrap();
        let dir_arg = dir.path().to_str().unwrap();

        let cli = parse(&["--persistence-dir", dir_arg, "add", "seeded"]);
        {
            let peer = TasksPeer::new(cli.peer_config()).unwrap();
            run_command(&peer, cli.command.unwrap()).unwrap();
        }

        let cli = parse(&["--persistence-dir", dir_arg, "query", "SELECT * FROM tasks"]);
        let peer = TasksPeer::new(cli.peer_config()).unwrap();
        assert_eq!(peer.get_tasks(false).unwrap()[0].title, "seeded");
        run_command(&peer, cli.command.unwrap()).unwrap();
        assert!(run_command(&peer, Command::Query { dql: "NOT A QUERY".into() }).is_err());
    }
}

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use leitwerk::{
    EventBus, JsonFileStore, LeitEvent, SessionConfig, SessionManager, SessionType,
    TerminalManager,
};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("leitwerk")
        .join("state.json")
}

fn print_event(event: &LeitEvent) {
    // Raw bytes go to stdout untouched; the terminal renders them.
    if let LeitEvent::SessionOutput { bytes, .. } = event {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(bytes);
        let _ = stdout.flush();
        return;
    }

    let payload = match event {
        LeitEvent::SessionOutput { .. } => unreachable!(),
        LeitEvent::SessionCreated { session } => json!({ "id": session.id, "name": session.name }),
        LeitEvent::SessionError { message } => json!({ "message": message }),
        LeitEvent::SessionReopened { session_id } | LeitEvent::SessionDeleted { session_id } => {
            json!({ "id": session_id })
        }
        LeitEvent::SessionsLoaded { sessions } => json!({ "count": sessions.len() }),
        LeitEvent::AgentStarted { session_id } => json!({ "id": session_id }),
        LeitEvent::ServersUpdated {
            session_id,
            servers,
        } => json!({ "id": session_id, "servers": servers }),
        LeitEvent::TerminalClosed { terminal_id } => json!({ "terminal": terminal_id }),
    };
    eprintln!("{}", json!({ "event": event.name(), "payload": payload }));
}

async fn stream_until_interrupted(manager: &SessionManager, session_id: &str) -> Result<()> {
    let mut rx = manager.events().subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = rx.recv() => match event {
                Ok(event) => print_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    manager.close_session(session_id).await;
    manager.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let store_path = args.store.unwrap_or_else(default_store_path);
    let store = Arc::new(
        JsonFileStore::open(&store_path)
            .with_context(|| format!("Cannot open store at {}", store_path.display()))?,
    );
    let events = EventBus::default();
    let terminals = Arc::new(TerminalManager::new(events.clone()));
    let manager = SessionManager::new(store, terminals, events);

    match args.command {
        Command::Run {
            project,
            agent,
            parent_branch,
            local,
            name,
            skip_permissions,
            setup_commands,
            prompt,
        } => {
            manager.startup()?;
            let config = SessionConfig {
                project_directory: project,
                session_type: if local {
                    SessionType::Local
                } else {
                    SessionType::Worktree
                },
                parent_branch,
                branch_name: name,
                coding_agent: agent.into(),
                skip_permissions,
                setup_commands,
                initial_prompt: prompt,
            };
            let session = manager.create_session(config).await?;
            eprintln!(
                "session {} ({}) in {}",
                session.name,
                session.id,
                session.worktree_path.display()
            );
            stream_until_interrupted(&manager, &session.id).await?;
        }
        Command::Reopen { id } => {
            manager.startup()?;
            manager.reopen_session(&id).await?;
            stream_until_interrupted(&manager, &id).await?;
        }
        Command::List => {
            for session in manager.startup()? {
                println!(
                    "{}  #{:<3} {:<24} {}",
                    session.id,
                    session.number,
                    session.name,
                    session.worktree_path.display()
                );
            }
        }
        Command::Branches { project } => {
            for branch in manager.list_branches(&project)? {
                println!("{branch}");
            }
        }
        Command::Delete { id } => {
            manager.delete_session(&id).await?;
            eprintln!("deleted {id}");
        }
        Command::Rename { id, name } => {
            manager.rename_session(&id, &name)?;
            eprintln!("renamed {id} to {name}");
        }
    }

    Ok(())
}

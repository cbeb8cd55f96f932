//! Session lifecycle commands: start, end and list

use anyhow::Result;
use variantis_core::SessionStatus;

use crate::commands::{open_service, open_store, print_json};
use crate::config::Config;
use crate::error::CliError;

pub fn start(config: &Config, client_addr: &str, json: bool) -> Result<()> {
    let service = open_service(config)?;
    let status = service.start_session(client_addr).map_err(CliError::from)?;

    if json {
        return print_json(&status);
    }
    match status {
        SessionStatus::Active { session_id } => {
            log::info!("Started session for {}", client_addr);
            println!("{}", session_id);
            Ok(())
        }
        SessionStatus::Busy => Err(CliError::Busy {
            capacity: config.sessions.max_active_sessions,
        }
        .into()),
    }
}

pub fn end(config: &Config, session: &str) -> Result<()> {
    let service = open_service(config)?;
    service.end_session(session).map_err(CliError::from)?;
    log::info!("Session {} ended", session);
    Ok(())
}

/// Every stored session, open or ended
pub fn list(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let sessions = store.sessions().map_err(CliError::from)?;

    if json {
        return print_json(&sessions);
    }
    let active = store.count_active().map_err(CliError::from)?;
    println!(
        "{} sessions, {} active (capacity {})",
        sessions.len(),
        active,
        store.policy().max_active_sessions
    );
    for session in &sessions {
        let state = match session.ended_at {
            Some(ended) => format!("ended {}", ended.format("%Y-%m-%d %H:%M:%S")),
            None => "active".to_string(),
        };
        println!(
            "{}  {:<15}  started {}  last seen {}  {}",
            session.id,
            session.client_addr,
            session.started_at.format("%Y-%m-%d %H:%M:%S"),
            session.last_activity.format("%H:%M:%S"),
            state
        );
    }
    Ok(())
}

use anyhow::Result;
use chrono::{Local, TimeZone};

use super::open_tutor;
use crate::core::AppConfig;

pub async fn run(config: &AppConfig) -> Result<()> {
    let tutor = open_tutor(config).await?;
    let sessions = tutor.list_sessions().await?;
    if sessions.is_empty() {
        println!("Aucune conversation.");
        return Ok(());
    }

    for session in sessions {
        let modified = Local
            .timestamp_millis_opt(session.last_modified)
            .single()
            .map(|d| d.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{}  {:<5}  {}  {}",
            session.id,
            session.mode.as_str(),
            modified,
            session.title
        );
    }
    Ok(())
}

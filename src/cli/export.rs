use anyhow::{Result, anyhow};
use chrono::Local;

use super::open_tutor;
use crate::core::AppConfig;
use crate::export::{export_file_name, export_transcript};

pub async fn run(config: &AppConfig, id: &str, out: Option<String>) -> Result<()> {
    let tutor = open_tutor(config).await?;
    let session = tutor
        .load_session(id)
        .await?
        .ok_or(anyhow!("Chat session {} not found", id))?;

    let now = Local::now();
    let doc = export_transcript(&session.title, &session.lines(), &now);
    let path = out.unwrap_or_else(|| export_file_name(&now));
    tokio::fs::write(&path, doc).await?;
    println!("Exported \"{}\" to {}", session.title, path);

    Ok(())
}

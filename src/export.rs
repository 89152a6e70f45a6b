//! Plain text export of a conversation so students can keep their
//! revision sessions.
use chrono::{DateTime, Local, TimeZone};

use crate::chat::Role;
use crate::markdown::clean_for_export;

pub fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "Vous :",
        Role::Model => "ADA (Assistant) :",
    }
}

/// Format the `(role, text)` lines of a conversation as a document.
pub fn export_transcript<Tz: TimeZone>(
    title: &str,
    lines: &[(Role, String)],
    exported_at: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut doc = format!(
        "{}\nExporté le {} à {}\n\n",
        title,
        exported_at.format("%d/%m/%Y"),
        exported_at.format("%H:%M:%S")
    );
    for (role, text) in lines {
        doc.push_str(speaker(*role));
        doc.push('\n');
        doc.push_str(clean_for_export(text).trim_end());
        doc.push_str("\n\n");
    }
    doc
}

/// Export as of now in local time.
pub fn export_now(title: &str, lines: &[(Role, String)]) -> String {
    export_transcript(title, lines, &Local::now())
}

pub fn export_file_name<Tz: TimeZone>(exported_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("session-{}.txt", exported_at.format("%Y-%m-%d"))
}

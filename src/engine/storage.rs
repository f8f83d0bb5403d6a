//! Directory listings
//!
//! Produces `NLST` name lists and `ls -l` style `LIST` lines for a real
//! directory (or a single file).

use chrono::{DateTime, Duration, Local};
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Entries older than this show a year instead of a time of day.
const RECENT_DAYS: i64 = 180;

/// Lists `real`, sorted by name. A file lists as itself.
pub async fn list_directory(real: &Path, names_only: bool) -> io::Result<Vec<String>> {
    let metadata = tokio::fs::metadata(real).await?;
    let now = Local::now();

    if !metadata.is_dir() {
        let name = real
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(vec![render(&name, &metadata, names_only, now)]);
    }

    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(real).await?;
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        // Entries that vanish or cannot be stat'ed mid-listing are skipped.
        if let Ok(metadata) = entry.metadata().await {
            entries.push((name, metadata));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(entries
        .iter()
        .map(|(name, metadata)| render(name, metadata, names_only, now))
        .collect())
}

fn render(name: &str, metadata: &Metadata, names_only: bool, now: DateTime<Local>) -> String {
    if names_only {
        return name.to_string();
    }
    let kind = if metadata.is_dir() { 'd' } else { '-' };
    format!(
        "{}{} 1 ftp ftp {:>12} {} {}",
        kind,
        mode_string(metadata),
        metadata.len(),
        format_mtime(metadata.modified().ok(), now),
        name
    )
}

#[cfg(unix)]
fn mode_string(metadata: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    let flags = ['r', 'w', 'x'];
    (0..9)
        .map(|bit| {
            if mode & (0o400 >> bit) != 0 {
                flags[bit % 3]
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(not(unix))]
fn mode_string(metadata: &Metadata) -> String {
    if metadata.permissions().readonly() {
        "r--r--r--".to_string()
    } else {
        "rw-rw-rw-".to_string()
    }
}

fn format_mtime(modified: Option<SystemTime>, now: DateTime<Local>) -> String {
    let modified: DateTime<Local> = match modified {
        Some(time) => time.into(),
        None => now,
    };
    if now.signed_duration_since(modified) > Duration::days(RECENT_DAYS) {
        modified.format("%b %d  %Y").to_string()
    } else {
        modified.format("%b %d %H:%M").to_string()
    }
}

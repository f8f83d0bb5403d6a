//! Local directory listing

use std::fs;
use std::path::Path;

use crate::client::results::DirEntry;
use crate::error::FtpError;

/// Lists `dir` sorted by name. Directories carry no size.
pub fn list_local(dir: &Path) -> Result<Vec<DirEntry>, FtpError> {
    let entries =
        fs::read_dir(dir).map_err(|e| FtpError::local_io(dir.display().to_string(), e))?;

    let mut listing: Vec<DirEntry> = entries
        .flatten()
        .map(|entry| {
            let size = match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => Some(meta.len()),
                _ => None,
            };
            DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                size,
            }
        })
        .collect();
    listing.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listing)
}

//! One-shot maintenance commands: `list`, `delete` and `clear-db`.
//!
//! Output goes to the given writer and confirmations are read from the given
//! reader so the commands can be driven from tests.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use transcoder_db::repositories::SkipRecordRepo;
use transcoder_db::DbPool;

use crate::error::WorkerResult;
use crate::scanner;

/// Transcoded files found under a library root.
#[derive(Debug, Default)]
pub struct TranscodeListing {
    pub total_sources: usize,
    pub transcoded: Vec<PathBuf>,
}

pub fn collect_transcodes(input_dir: &Path) -> TranscodeListing {
    let sources = scanner::find_source_files(input_dir);
    TranscodeListing {
        total_sources: sources.len(),
        transcoded: scanner::find_transcoded_files(&sources),
    }
}

/// Print the `Press y to continue...` prompt and read one answer.
///
/// Only `y` (case-insensitive, surrounding whitespace ignored) confirms.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<bool> {
    writeln!(out, "Press y to continue...")?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn print_listing<W: Write>(listing: &TranscodeListing, out: &mut W, verb: &str) -> io::Result<()> {
    writeln!(out, "Found {} total files.", listing.total_sources)?;
    writeln!(out, "Found {} transcoded files{verb}", listing.transcoded.len())?;
    for path in &listing.transcoded {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        writeln!(out, " - {name}")?;
    }
    Ok(())
}

pub fn list<W: Write>(input_dir: &Path, out: &mut W) -> WorkerResult<TranscodeListing> {
    writeln!(out, "Finding all transcoded files ...")?;
    let listing = collect_transcodes(input_dir);
    print_listing(&listing, out, ":")?;
    Ok(listing)
}

/// Delete every transcoded file. Returns the number of files removed, or
/// `None` when the user declined.
pub fn delete<R: BufRead, W: Write>(
    input_dir: &Path,
    assume_yes: bool,
    input: &mut R,
    out: &mut W,
) -> WorkerResult<Option<usize>> {
    writeln!(out, "Finding all transcoded files for deletion ...")?;
    let listing = collect_transcodes(input_dir);
    print_listing(&listing, out, " to delete.")?;

    if !assume_yes && !confirm(input, out)? {
        writeln!(out, "Aborting deletion.")?;
        return Ok(None);
    }

    let mut deleted = 0;
    for path in &listing.transcoded {
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Deleted transcoded file");
                deleted += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    writeln!(out, "Deletion complete.")?;
    Ok(Some(deleted))
}

/// Remove all skip records. Returns the number of rows removed, or `None`
/// when the user declined.
pub async fn clear_db<R: BufRead, W: Write>(
    pool: &DbPool,
    db_path: &Path,
    assume_yes: bool,
    input: &mut R,
    out: &mut W,
) -> WorkerResult<Option<u64>> {
    writeln!(out, "This will remove all skip-tracking records.")?;
    writeln!(out, "Database path: {}", db_path.display())?;

    if !assume_yes && !confirm(input, out)? {
        writeln!(out, "Aborting DB clear.")?;
        return Ok(None);
    }

    let removed = SkipRecordRepo::clear(pool).await?;
    writeln!(out, "Skip-tracking table cleared.")?;
    Ok(Some(removed))
}

//! Durable storage for this node's current vote.
//!
//! The record is a single text line:
//!
//! ```text
//! <height>,<hash as hex, grouped in 16-character blocks separated by dashes>
//! ```
//!
//! Writes go to a sibling temp file that is then renamed over the record, so a
//! crash mid-write leaves either the old vote or the new one, never a torn line.

use diversity_core::{StorageError, VoteStorage};
use diversity_types::{CurrentVote, Hash};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// File name used when the storage is rooted at a data directory.
pub const VOTE_FILE_NAME: &str = "consensus_vote";

const HEX_GROUP: usize = 16;

/// [`VoteStorage`] backed by one small file.
#[derive(Debug, Clone)]
pub struct FileVoteStorage {
    path: PathBuf,
}

impl FileVoteStorage {
    /// Store the vote at exactly `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store the vote as [`VOTE_FILE_NAME`] inside `data_dir`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(VOTE_FILE_NAME))
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read(&self) -> Result<Option<CurrentVote>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        parse_record(&contents).map(Some)
    }

    fn write(&self, vote: &CurrentVote) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp)?;
            writeln!(file, "{}", format_record(vote))?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl VoteStorage for FileVoteStorage {
    fn load_current_vote(&self) -> Option<CurrentVote> {
        match self.read() {
            Ok(Some(vote)) => {
                debug!(
                    height = vote.height,
                    block_hash = %vote.hash,
                    path = %self.path.display(),
                    "Loaded current vote"
                );
                Some(vote)
            }
            Ok(None) => {
                trace!(path = %self.path.display(), "No stored vote");
                None
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Ignoring unreadable vote file");
                None
            }
        }
    }

    fn store_current_vote(&self, vote: &CurrentVote) -> Result<(), StorageError> {
        self.write(vote)?;
        trace!(height = vote.height, block_hash = %vote.hash, "Stored current vote");
        Ok(())
    }
}

/// Render a vote as its on-disk line (without the trailing newline).
pub fn format_record(vote: &CurrentVote) -> String {
    let hex = vote.hash.to_hex();
    let groups: Vec<&str> = hex
        .as_bytes()
        .chunks(HEX_GROUP)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();
    format!("{},{}", vote.height, groups.join("-"))
}

/// Parse an on-disk line. The loaded vote carries timestamp zero.
pub fn parse_record(contents: &str) -> Result<CurrentVote, StorageError> {
    let line = contents.trim();
    let (height, hash) = line
        .split_once(',')
        .ok_or_else(|| StorageError::Malformed(format!("missing separator in {line:?}")))?;

    let height = height
        .trim()
        .parse::<u64>()
        .map_err(|e| StorageError::Malformed(format!("bad height: {e}")))?;
    let hash = Hash::from_hex(hash).map_err(|e| StorageError::Malformed(e.to_string()))?;

    Ok(CurrentVote {
        height,
        hash,
        timestamp: 0,
    })
}

//! Line sources feeding the watcher.
//!
//! [`FileTail`] follows a continuously appended file from its end;
//! [`MemorySource`] replays a scripted feed.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs::Metadata;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info, warn};

use crate::utils::AppError;

/// Longest unterminated line kept in memory; longer lines are dropped
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Result of one poll of a line source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinePoll {
    /// A complete line, without its terminator
    Line(String),
    /// Nothing new yet
    Pending,
}

/// Source of log lines. An `Err` means the source is gone for good.
#[async_trait]
pub trait LineSource: Send {
    async fn next_line(&mut self) -> Result<LinePoll, AppError>;
}

/// (device, inode) of an open file
type FileIdentity = (u64, u64);

#[cfg(unix)]
fn file_identity(metadata: &Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_identity(_metadata: &Metadata) -> Option<FileIdentity> {
    None
}

/// Follows a file the way `tail -F` does, starting at its current end
pub struct FileTail {
    path: PathBuf,
    reader: BufReader<File>,
    identity: Option<FileIdentity>,
    /// Pipes and devices cannot be rewound or compared by length
    seekable: bool,
    /// Bytes consumed so far, including any buffered partial line
    position: u64,
    partial: Vec<u8>,
    /// Dropping the rest of an oversized line
    discarding: bool,
}

impl FileTail {
    /// Open `path` and skip everything already written to it
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).await?;
        let identity = file_identity(&file.metadata().await?);

        let (position, seekable) = match file.seek(SeekFrom::End(0)).await {
            Ok(end) => (end, true),
            Err(e) => {
                warn!(
                    error = %e,
                    path = %path.display(),
                    "Log source is not seekable, reading from current position"
                );
                (0, false)
            }
        };

        info!(path = %path.display(), offset = position, seekable, "Tailing log source");

        Ok(Self {
            path,
            reader: BufReader::new(file),
            identity,
            seekable,
            position,
            partial: Vec::new(),
            discarding: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    /// Called when no new bytes are available.
    ///
    /// Fails if the path was removed or became unreadable. Follows a new
    /// file created at the path after rotation, and rewinds if the same
    /// file was truncated underneath us.
    async fn check_source(&mut self) -> Result<(), AppError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::source_lost(&self.path, "file was removed"));
            }
            Err(e) => return Err(AppError::source_lost(&self.path, e.to_string())),
        };

        if !self.seekable {
            return Ok(());
        }

        let current = file_identity(&metadata);
        if current.is_some() && current != self.identity {
            return self.reopen(current).await;
        }

        if metadata.len() < self.position {
            info!(
                path = %self.path.display(),
                previous_offset = self.position,
                current_len = metadata.len(),
                "Log source was truncated, reading from the start"
            );
            self.reader
                .seek(SeekFrom::Start(0))
                .await
                .map_err(|e| AppError::source_lost(&self.path, e.to_string()))?;
            self.reset();
        }

        Ok(())
    }

    /// Switch to the file now at the path. It was created after we started
    /// following, so it is read from its first byte.
    async fn reopen(&mut self, identity: Option<FileIdentity>) -> Result<(), AppError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| AppError::source_lost(&self.path, e.to_string()))?;

        info!(
            path = %self.path.display(),
            previous_offset = self.position,
            "Log source was rotated, following the new file"
        );
        self.reader = BufReader::new(file);
        self.identity = identity;
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.position = 0;
        self.partial.clear();
        self.discarding = false;
    }
}

#[async_trait]
impl LineSource for FileTail {
    async fn next_line(&mut self) -> Result<LinePoll, AppError> {
        // Never below 1: the buffer is cleared once it reaches the cap
        let budget = MAX_LINE_BYTES.saturating_sub(self.partial.len()).max(1) as u64;
        let read = (&mut self.reader)
            .take(budget)
            .read_until(b'\n', &mut self.partial)
            .await
            .map_err(|e| AppError::source_lost(&self.path, e.to_string()))?;

        if read == 0 {
            self.check_source().await?;
            return Ok(LinePoll::Pending);
        }
        self.position += read as u64;

        if self.partial.last() != Some(&b'\n') {
            if self.partial.len() >= MAX_LINE_BYTES {
                if !self.discarding {
                    warn!(
                        limit = MAX_LINE_BYTES,
                        "Log line exceeds size limit, discarding until next newline"
                    );
                }
                self.partial.clear();
                self.discarding = true;
            } else {
                // Writer has not finished the line yet
                debug!(buffered = self.partial.len(), "Partial line buffered");
            }
            return Ok(LinePoll::Pending);
        }

        let bytes = std::mem::take(&mut self.partial);
        if self.discarding {
            self.discarding = false;
            return Ok(LinePoll::Pending);
        }

        let line = String::from_utf8_lossy(&bytes)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        Ok(LinePoll::Line(line))
    }
}

/// In-memory line feed.
///
/// Yields its scripted polls in order, then reports the source as lost.
#[derive(Debug, Default)]
pub struct MemorySource {
    polls: VecDeque<LinePoll>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut source = Self::new();
        for line in lines {
            source.push_line(line);
        }
        source
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.polls.push_back(LinePoll::Line(line.into()));
    }

    pub fn push_pending(&mut self) {
        self.polls.push_back(LinePoll::Pending);
    }

    pub fn remaining(&self) -> usize {
        self.polls.len()
    }
}

#[async_trait]
impl LineSource for MemorySource {
    async fn next_line(&mut self) -> Result<LinePoll, AppError> {
        self.polls
            .pop_front()
            .ok_or_else(|| AppError::source_lost("<memory>", "feed exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::fs;
    use std::io::Write;
    use uuid::Uuid;

    fn test_log_path(name: &str) -> PathBuf {
        let dir = temp_dir().join(format!("test_line_source_{}_{}", name, Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("Failed to create test dir");
        dir.join("access.log")
    }

    fn append(path: &Path, content: &str) {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .expect("Failed to open log file");
        file.write_all(content.as_bytes())
            .expect("Failed to append to log file");
    }

    #[tokio::test]
    async fn should_skip_content_written_before_open() {
        // Arrange
        let path = test_log_path("skip_history");
        append(&path, "{\"pool\":\"blue\",\"status\":200}\n");
        let mut tail = FileTail::open(&path).await.expect("Failed to open");

        // Act
        let first = tail.next_line().await.expect("poll");
        append(&path, "{\"pool\":\"green\",\"status\":200}\n");
        let second = tail.next_line().await.expect("poll");

        // Assert
        assert_eq!(first, LinePoll::Pending);
        assert_eq!(
            second,
            LinePoll::Line("{\"pool\":\"green\",\"status\":200}".to_string())
        );
    }

    #[tokio::test]
    async fn should_buffer_partial_lines_until_newline() {
        // Arrange
        let path = test_log_path("partial");
        append(&path, "");
        let mut tail = FileTail::open(&path).await.expect("Failed to open");

        // Act
        append(&path, "{\"pool\":");
        let partial = tail.next_line().await.expect("poll");
        append(&path, "\"blue\"}\r\n");
        let complete = tail.next_line().await.expect("poll");

        // Assert
        assert_eq!(partial, LinePoll::Pending);
        assert_eq!(complete, LinePoll::Line("{\"pool\":\"blue\"}".to_string()));
    }

    #[tokio::test]
    async fn should_fail_when_file_is_removed() {
        // Arrange
        let path = test_log_path("removed");
        append(&path, "old line\n");
        let mut tail = FileTail::open(&path).await.expect("Failed to open");
        fs::remove_file(&path).expect("Failed to remove log file");

        // Act
        let result = tail.next_line().await;

        // Assert
        assert!(matches!(result, Err(AppError::SourceLost { .. })));
    }

    #[tokio::test]
    async fn should_rewind_after_truncation() {
        // Arrange
        let path = test_log_path("truncated");
        append(&path, "line one is fairly long\nline two is fairly long\n");
        let mut tail = FileTail::open(&path).await.expect("Failed to open");
        fs::write(&path, "").expect("Failed to truncate");

        // Act
        let after_truncate = tail.next_line().await.expect("poll");
        append(&path, "fresh\n");
        let fresh = tail.next_line().await.expect("poll");

        // Assert
        assert_eq!(after_truncate, LinePoll::Pending);
        assert_eq!(tail.position(), 6);
        assert_eq!(fresh, LinePoll::Line("fresh".to_string()));
    }

    #[tokio::test]
    async fn should_follow_new_file_after_rename_rotation() {
        // Arrange
        let path = test_log_path("rotated");
        append(&path, "{\"pool\":\"blue\",\"status\":500}\nhistory line\n");
        let mut tail = FileTail::open(&path).await.expect("Failed to open");
        fs::rename(&path, path.with_extension("log.1")).expect("Failed to rotate");
        fs::File::create(&path).expect("Failed to recreate log file");

        // Act
        let after_rotation = tail.next_line().await.expect("poll");
        append(&path, "new line\n");
        let fresh = tail.next_line().await.expect("poll");
        let mut later = Vec::new();
        for _ in 0..3 {
            later.push(tail.next_line().await.expect("poll"));
        }

        // Assert
        assert_eq!(after_rotation, LinePoll::Pending);
        assert_eq!(fresh, LinePoll::Line("new line".to_string()));
        assert_eq!(later, vec![LinePoll::Pending; 3]);
        assert_eq!(tail.position(), 9);
    }

    #[tokio::test]
    async fn should_drop_oversized_line_and_resync_at_newline() {
        // Arrange
        let path = test_log_path("oversized");
        append(&path, "");
        let mut tail = FileTail::open(&path).await.expect("Failed to open");
        let oversized = "x".repeat(MAX_LINE_BYTES + 6 * 1024);
        append(&path, &format!("{}\nnext\n", oversized));

        // Act
        let first = tail.next_line().await.expect("poll");
        let second = tail.next_line().await.expect("poll");
        let third = tail.next_line().await.expect("poll");

        // Assert
        assert_eq!(first, LinePoll::Pending);
        assert_eq!(second, LinePoll::Pending);
        assert_eq!(third, LinePoll::Line("next".to_string()));
        assert_eq!(tail.position(), (oversized.len() + 6) as u64);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn should_read_fifo_without_rewinding() {
        // Arrange
        let path = test_log_path("fifo");
        let status = std::process::Command::new("mkfifo")
            .arg(&path)
            .status()
            .expect("Failed to run mkfifo");
        assert!(status.success());
        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            let mut fifo = fs::OpenOptions::new()
                .write(true)
                .open(&writer_path)
                .expect("Failed to open fifo for writing");
            fifo.write_all(b"{\"pool\":\"blue\"}\n{\"pool\":\"green\"}\n")
                .expect("Failed to write to fifo");
        });
        let mut tail = FileTail::open(&path).await.expect("Failed to open");
        writer.join().expect("writer thread panicked");

        // Act
        let mut polls = Vec::new();
        for _ in 0..3 {
            polls.push(tail.next_line().await.expect("poll"));
        }

        // Assert
        assert!(!tail.is_seekable());
        assert_eq!(
            polls,
            vec![
                LinePoll::Line("{\"pool\":\"blue\"}".to_string()),
                LinePoll::Line("{\"pool\":\"green\"}".to_string()),
                LinePoll::Pending,
            ]
        );
    }

    #[tokio::test]
    async fn should_replay_memory_feed_then_report_loss() {
        // Arrange
        let mut source = MemorySource::from_lines(["a"]);
        source.push_pending();

        // Act & Assert
        assert_eq!(source.next_line().await.expect("poll"), LinePoll::Line("a".to_string()));
        assert_eq!(source.next_line().await.expect("poll"), LinePoll::Pending);
        assert!(source.next_line().await.is_err());
    }
}

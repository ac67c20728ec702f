//! # Durable task journal.
//!
//! The engine writes every task snapshot to a [`Journal`] on each transition,
//! and a removal on eviction. On startup the journal is replayed so pending
//! and interrupted work survives a process restart.
//!
//! Built-ins:
//! - [`MemoryJournal`]: keeps the latest snapshot per task in memory (tests, embedding).
//! - [`FileJournal`]: append-only JSON lines, one operation per line:
//!
//! ```text
//! {"op":"upsert","task":{"id":"5f0c...","status":"pending",...}}
//! {"op":"upsert","task":{"id":"5f0c...","status":"running",...}}
//! {"op":"remove","id":"5f0c..."}
//! ```
//!
//! Replay keeps the last record per id; a `remove` is a tombstone. A torn
//! trailing line (crash mid-write) is skipped with a warning and never glued
//! to the next append. Replay also compacts the file down to the live set.

use std::collections::HashMap;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::JournalError;
use crate::tasks::{Task, TaskId};

/// Durable record of task snapshots.
#[async_trait]
pub trait Journal: Send + Sync + 'static {
    /// Records the latest snapshot of `task`.
    async fn save(&self, task: &Task) -> Result<(), JournalError>;

    /// Forgets the task with `id`.
    async fn remove(&self, id: TaskId) -> Result<(), JournalError>;

    /// Returns the live tasks, ordered by `seq`.
    async fn load(&self) -> Result<Vec<Task>, JournalError>;
}

fn by_seq(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by_key(|t| t.seq);
    tasks
}

/// In-memory journal.
#[derive(Default)]
pub struct MemoryJournal {
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn save(&self, task: &Task) -> Result<(), JournalError> {
        self.tasks.lock().insert(task.id, task.clone());
        Ok(())
    }

    async fn remove(&self, id: TaskId) -> Result<(), JournalError> {
        self.tasks.lock().remove(&id);
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Task>, JournalError> {
        Ok(by_seq(self.tasks.lock().values().cloned().collect()))
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum EntryRef<'a> {
    Upsert { task: &'a Task },
    Remove { id: TaskId },
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Entry {
    Upsert { task: Box<Task> },
    Remove { id: TaskId },
}

/// Tombstones appended before the file is compacted in place.
const COMPACT_AFTER_REMOVALS: usize = 1024;

/// Append-only JSON-lines journal on the local filesystem.
///
/// `load` rewrites the file to the live set when it holds superseded,
/// removed or unreadable lines; the same compaction runs after every
/// [`FileJournal::with_compact_after`] removals.
pub struct FileJournal {
    path: PathBuf,
    file: tokio::sync::Mutex<Option<File>>,
    compact_after: usize,
    removals: AtomicUsize,
}

impl FileJournal {
    /// Creates a journal at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: tokio::sync::Mutex::new(None),
            compact_after: COMPACT_AFTER_REMOVALS,
            removals: AtomicUsize::new(0),
        }
    }

    /// Compacts after `removals` tombstones (`0` disables runtime compaction).
    pub fn with_compact_after(mut self, removals: usize) -> Self {
        self.compact_after = removals;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, entry: &EntryRef<'_>) -> Result<(), JournalError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            *guard = Some(open_for_append(&self.path).await?);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(&line).await?;
            file.flush().await?;
        }
        Ok(())
    }

    /// Replays the file and, when it carries dead lines, rewrites it to the live set.
    pub async fn compact(&self) -> Result<Vec<Task>, JournalError> {
        let mut guard = self.file.lock().await;
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut live: HashMap<TaskId, Task> = HashMap::new();
        let mut lines = 0;
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            lines += 1;
            match serde_json::from_str::<Entry>(line) {
                Ok(Entry::Upsert { task }) => {
                    live.insert(task.id, *task);
                }
                Ok(Entry::Remove { id }) => {
                    live.remove(&id);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = lineno + 1,
                        error = %e,
                        "skipping unreadable journal line"
                    );
                }
            }
        }
        let tasks = by_seq(live.into_values().collect());
        self.removals.store(0, Ordering::Relaxed);

        if lines > tasks.len() || !(raw.is_empty() || raw.ends_with('\n')) {
            // The open handle points at the file being replaced.
            *guard = None;
            self.rewrite(&tasks).await?;
            tracing::debug!(
                path = %self.path.display(),
                before = lines,
                after = tasks.len(),
                "journal compacted"
            );
        }
        Ok(tasks)
    }

    /// Writes `tasks` to a sibling temp file and renames it over the journal.
    async fn rewrite(&self, tasks: &[Task]) -> Result<(), JournalError> {
        let mut buf = Vec::new();
        for task in tasks {
            serde_json::to_writer(&mut buf, &EntryRef::Upsert { task })?;
            buf.push(b'\n');
        }
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".compact");
        let tmp = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp).await?;
        file.write_all(&buf).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Opens `path` for appending, terminating a torn last line first.
async fn open_for_append(path: &Path) -> Result<File, JournalError> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .await?;
    if file.metadata().await?.len() > 0 {
        file.seek(SeekFrom::End(-1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        if last[0] != b'\n' {
            file.write_all(b"\n").await?;
        }
    }
    Ok(file)
}

#[async_trait]
impl Journal for FileJournal {
    async fn save(&self, task: &Task) -> Result<(), JournalError> {
        self.append(&EntryRef::Upsert { task }).await
    }

    async fn remove(&self, id: TaskId) -> Result<(), JournalError> {
        self.append(&EntryRef::Remove { id }).await?;
        let removed = self.removals.fetch_add(1, Ordering::Relaxed) + 1;
        if self.compact_after > 0 && removed >= self.compact_after {
            self.compact().await?;
        }
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Task>, JournalError> {
        self.compact().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{ExecutionContext, Priority, TaskStatus, TaskType};
    use chrono::Utc;
    use serde_json::json;

    fn task(seq: u64) -> Task {
        let mut t = Task::new(
            TaskType::BimAnalysis,
            json!({"modelId": format!("m-{seq}")}),
            ExecutionContext::new("user-1", "bim-agent").with_project("tower-a"),
            Priority::High,
            3,
        );
        t.seq = seq;
        t
    }

    #[tokio::test]
    async fn memory_journal_keeps_latest_snapshot() {
        let journal = MemoryJournal::new();
        let mut a = task(2);
        let b = task(1);
        journal.save(&a).await.unwrap();
        journal.save(&b).await.unwrap();
        a.start(Utc::now());
        journal.save(&a).await.unwrap();

        let loaded = journal.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, b.id);
        assert_eq!(loaded[1].status, TaskStatus::Running);

        journal.remove(b.id).await.unwrap();
        assert_eq!(journal.len(), 1);
    }

    #[tokio::test]
    async fn file_journal_replays_last_record_and_tombstones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.jsonl");

        let mut a = task(1);
        let b = task(2);
        {
            let journal = FileJournal::new(&path);
            journal.save(&a).await.unwrap();
            journal.save(&b).await.unwrap();
            a.start(Utc::now());
            journal.save(&a).await.unwrap();
            journal.remove(b.id).await.unwrap();
        }

        let reopened = FileJournal::new(&path);
        let loaded = reopened.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, a.id);
        assert_eq!(loaded[0].status, TaskStatus::Running);
        assert_eq!(loaded[0].context.project_id.as_deref(), Some("tower-a"));
    }

    #[tokio::test]
    async fn file_journal_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = FileJournal::new(dir.path().join("absent.jsonl"));
        assert!(journal.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn torn_trailing_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.jsonl");
        let journal = FileJournal::new(&path);
        let t = task(7);
        journal.save(&t).await.unwrap();
        drop(journal);

        let mut raw = tokio::fs::read_to_string(&path).await.unwrap();
        raw.push_str("{\"op\":\"upsert\",\"task\":{\"id\":");
        tokio::fs::write(&path, raw).await.unwrap();

        let reopened = FileJournal::new(&path);
        let loaded = reopened.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, t.id);

        let fresh = task(8);
        reopened.save(&fresh).await.unwrap();
        drop(reopened);

        let ids: Vec<TaskId> = FileJournal::new(&path)
            .load()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![t.id, fresh.id]);
    }

    #[tokio::test]
    async fn append_after_torn_tail_starts_a_new_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.jsonl");
        tokio::fs::write(&path, "{\"op\":\"remove\",\"id\":")
            .await
            .unwrap();

        let t = task(1);
        let journal = FileJournal::new(&path);
        journal.save(&t).await.unwrap();
        drop(journal);

        let loaded = FileJournal::new(&path).load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, t.id);
    }

    #[tokio::test]
    async fn load_compacts_to_live_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.jsonl");
        let keep = task(0);
        {
            let journal = FileJournal::new(&path);
            journal.save(&keep).await.unwrap();
            for seq in 1..=20 {
                let mut t = task(seq);
                journal.save(&t).await.unwrap();
                t.start(Utc::now());
                t.complete(json!({"pages": seq}), Utc::now());
                journal.save(&t).await.unwrap();
                journal.remove(t.id).await.unwrap();
            }
        }
        let before = tokio::fs::metadata(&path).await.unwrap().len();

        let loaded = FileJournal::new(&path).load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        let after = tokio::fs::metadata(&path).await.unwrap().len();
        assert!(after < before / 10, "{after} >= {before} / 10");

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw.lines().count(), 1);
        assert!(raw.ends_with('\n'));
        assert_eq!(FileJournal::new(&path).load().await.unwrap()[0].id, keep.id);
    }

    #[tokio::test]
    async fn removals_trigger_compaction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.jsonl");
        let journal = FileJournal::new(&path).with_compact_after(3);
        let keep = task(0);
        journal.save(&keep).await.unwrap();
        for seq in 1..=3 {
            let t = task(seq);
            journal.save(&t).await.unwrap();
            journal.remove(t.id).await.unwrap();
        }

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw.lines().count(), 1);

        let next = task(4);
        journal.save(&next).await.unwrap();
        let ids: Vec<TaskId> = journal.load().await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![keep.id, next.id]);
    }
}

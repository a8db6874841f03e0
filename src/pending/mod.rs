//! Durable queue of session uploads the remote store has not accepted yet.
//!
//! The whole queue is rewritten to disk on every mutation. Queue sizes stay in
//! the dozens, so there is no incremental journal.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::{fs, sync::Mutex};

use crate::{
    error::{Result, SyncError},
    models::{PendingUpload, SessionRecord, TaskUsageSummary},
    remote::SessionUploader,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Outcome of one flush pass.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub delivered: usize,
    pub remaining: usize,
    pub errors: Vec<(PendingUpload, SyncError)>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// One aggregated message for every failed item, or `None` when all went out.
    pub fn summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let details: Vec<String> = self
            .errors
            .iter()
            .map(|(upload, err)| format!("{} ({}): {err}", upload.group_id, upload.user_name))
            .collect();
        Some(format!(
            "{} of {} queued sessions failed to upload: {}",
            self.errors.len(),
            self.delivered + self.errors.len(),
            details.join("; ")
        ))
    }
}

pub struct PendingWriteLog {
    path: PathBuf,
    entries: Mutex<Vec<PendingUpload>>,
    // Held for a whole flush pass so two passes never send the same entry.
    flushing: Mutex<()>,
}

impl PendingWriteLog {
    /// Loads the queue from `path`. A missing or unreadable file yields an
    /// empty queue.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let entries = match fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<Vec<PendingUpload>>(&contents) {
                Ok(entries) => entries,
                Err(err) => {
                    log_warn!(
                        "Pending uploads at {} are unreadable ({err}); starting empty",
                        path.display()
                    );
                    Vec::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        if !entries.is_empty() {
            log_info!("Loaded {} pending uploads", entries.len());
        }

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            flushing: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn enqueue(
        &self,
        group_id: &str,
        user_name: &str,
        session: SessionRecord,
    ) -> Result<PendingUpload> {
        let upload = PendingUpload::new(group_id, user_name, session);
        let mut entries = self.entries.lock().await;
        entries.push(upload.clone());
        if let Err(err) = persist(&self.path, &entries).await {
            entries.pop();
            return Err(err);
        }
        log_info!(
            "Queued session for {user_name} in {group_id} ({} pending)",
            entries.len()
        );
        Ok(upload)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn entries(&self) -> Vec<PendingUpload> {
        self.entries.lock().await.clone()
    }

    /// Sends every queued upload in FIFO order. Delivered entries leave the
    /// queue; failed ones stay and their errors are collected in the report.
    pub async fn flush(&self, uploader: &dyn SessionUploader) -> Result<FlushReport> {
        let _pass = self.flushing.lock().await;
        let snapshot = self.entries.lock().await.clone();
        if snapshot.is_empty() {
            return Ok(FlushReport::default());
        }

        log_debug!("Flushing {} pending uploads", snapshot.len());
        let mut report = FlushReport::default();
        let mut delivered_ids = Vec::new();

        for upload in snapshot {
            match uploader
                .save_session_directly(&upload.group_id, &upload.user_name, &upload.session_data)
                .await
            {
                Ok(()) => {
                    delivered_ids.push(upload.id);
                    report.delivered += 1;
                }
                Err(err) => {
                    log_warn!("Pending upload {} failed: {err}", upload.id);
                    report.errors.push((upload, err));
                }
            }
        }

        // Entries enqueued during the pass are kept.
        let mut entries = self.entries.lock().await;
        entries.retain(|entry| !delivered_ids.contains(&entry.id));
        report.remaining = entries.len();
        if report.delivered > 0 {
            persist(&self.path, &entries).await?;
        }

        log_info!(
            "Flush delivered {} sessions; {} still pending",
            report.delivered,
            report.remaining
        );
        Ok(report)
    }

    /// Applies `edit` to every queued summary with this identity key.
    ///
    /// Waits for an in-flight flush so the edit lands either on the queued
    /// copy or after delivery, never on a copy that is about to be dropped.
    pub async fn edit_tasks<F>(
        &self,
        group_id: &str,
        user_name: &str,
        identity_key: &str,
        mut edit: F,
    ) -> Result<usize>
    where
        F: FnMut(&mut TaskUsageSummary) + Send,
    {
        let _pass = self.flushing.lock().await;
        let mut entries = self.entries.lock().await;
        let previous = entries.clone();

        let mut edited = 0;
        for entry in scoped_mut(&mut entries, group_id, user_name) {
            let session = &mut entry.session_data;
            let mut touched = false;
            for summary in session
                .task_summaries
                .iter_mut()
                .filter(|s| s.identity_key() == identity_key)
            {
                edit(summary);
                touched = true;
                edited += 1;
            }
            if touched {
                recount(session);
            }
        }

        if edited > 0 {
            if let Err(err) = persist(&self.path, &entries).await {
                *entries = previous;
                return Err(err);
            }
            log_debug!("Edited {edited} queued summaries for {identity_key}");
        }
        Ok(edited)
    }

    /// Removes every queued summary with this identity key. Sessions left
    /// without tasks leave the queue.
    pub async fn remove_tasks(&self, group_id: &str, user_name: &str, identity_key: &str) -> Result<usize> {
        let _pass = self.flushing.lock().await;
        let mut entries = self.entries.lock().await;
        let previous = entries.clone();

        let mut removed = 0;
        for entry in scoped_mut(&mut entries, group_id, user_name) {
            let session = &mut entry.session_data;
            let before = session.task_summaries.len();
            session.task_summaries.retain(|s| s.identity_key() != identity_key);
            if session.task_summaries.len() != before {
                removed += before - session.task_summaries.len();
                recount(session);
            }
        }

        if removed > 0 {
            entries.retain(|entry| !entry.session_data.task_summaries.is_empty());
            if let Err(err) = persist(&self.path, &entries).await {
                *entries = previous;
                return Err(err);
            }
            log_debug!("Removed {removed} queued summaries for {identity_key}");
        }
        Ok(removed)
    }

    /// Drops every entry and removes the backing file.
    pub async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        log_info!("Pending uploads cleared");
        Ok(())
    }

    /// Removes queued entries belonging to one group.
    pub async fn clear_group(&self, group_id: &str) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| entry.group_id != group_id);
        let removed = before - entries.len();
        if removed > 0 {
            persist(&self.path, &entries).await?;
        }
        Ok(removed)
    }
}

fn scoped_mut<'a>(
    entries: &'a mut [PendingUpload],
    group_id: &'a str,
    user_name: &'a str,
) -> impl Iterator<Item = &'a mut PendingUpload> {
    entries
        .iter_mut()
        .filter(move |entry| entry.group_id == group_id && entry.user_name == user_name)
}

fn recount(session: &mut SessionRecord) {
    session.completed_count = session.task_summaries.iter().filter(|s| s.is_completed).count() as i64;
}

async fn persist(path: &Path, entries: &[PendingUpload]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let serialized = serde_json::to_vec_pretty(entries)?;
    fs::write(path, serialized)
        .await
        .with_context(|| format!("Failed to write pending uploads to {}", path.display()))?;
    Ok(())
}

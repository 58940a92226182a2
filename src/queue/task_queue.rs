use log::debug;
use uuid::Uuid;

use crate::queue::model::{BackgroundColor, InputFile, TaskRecord, TaskResult, TaskStatus};

/// Ordered collection of task records. Insertion order drives both display
/// and dispatch order; the queue is the sole owner of its records.
#[derive(Debug, Default)]
pub struct TaskQueue {
    records: Vec<TaskRecord>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record per input file and returns the new ids. Never
    /// fails: files that do not decode as images simply carry no preview.
    pub fn append(&mut self, files: Vec<InputFile>) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let record = TaskRecord::new(file);
            debug!("queued task {} ({})", record.id, record.file_name);
            ids.push(record.id);
            self.records.push(record);
        }
        ids
    }

    /// Replaces status and, when given, the result fields of the matching
    /// record. No-op when the id is absent (late updates against removed
    /// records are tolerated).
    pub fn update_status(&mut self, id: Uuid, status: TaskStatus, result: Option<TaskResult>) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.set_status(status, result);
        } else {
            debug!("status update for missing task {} dropped", id);
        }
    }

    /// Sets the background selection on the matching record; no-op if absent.
    pub fn update_background(&mut self, id: Uuid, color: BackgroundColor) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.set_background(color);
        }
    }

    /// Deletes the record, dropping its owned buffers; no-op if absent.
    pub fn remove(&mut self, id: Uuid) {
        self.records.retain(|r| r.id != id);
    }

    /// Empties the queue unconditionally. Whether to clear (confirmation on
    /// tool switch, etc.) is the caller's decision.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn get(&self, id: Uuid) -> Option<&TaskRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut TaskRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

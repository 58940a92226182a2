use log::{info, warn};
use uuid::Uuid;

use crate::dispatch::{BatchDispatcher, DispatchError, ProcessingService};
use crate::queue::{InputFile, TaskQueue, TaskStatus};
use crate::raster::crop::{CropSession, extract};
use crate::raster::mask::MaskCanvas;
use crate::raster::{self, RasterError};
use crate::tools::Tool;

#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),
    #[error("no active session")]
    NoActiveSession,
    #[error("task source is not a decodable image")]
    NotAnImage,
    #[error("task {0} is not pending")]
    TaskNotPending(Uuid),
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

struct MaskSession {
    task_id: Uuid,
    canvas: MaskCanvas,
}

/// Single-focus coordinator: owns the queue, the active tool, and the one
/// crop or mask session that may exist at a time. All records in the queue
/// implicitly belong to the active tool.
pub struct Workbench {
    queue: TaskQueue,
    active_tool: Tool,
    crop_session: Option<CropSession>,
    mask_session: Option<MaskSession>,
}

impl Workbench {
    pub fn new(tool: Tool) -> Self {
        Self {
            queue: TaskQueue::new(),
            active_tool: tool,
            crop_session: None,
            mask_session: None,
        }
    }

    pub fn active_tool(&self) -> Tool {
        self.active_tool
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut TaskQueue {
        &mut self.queue
    }

    /// Switches the active tool. With records queued this requires the
    /// confirmation oracle to agree, and agreeing clears the queue; either
    /// way a switch discards any open authoring session. Returns whether the
    /// switch happened.
    pub fn switch_tool(&mut self, tool: Tool, confirm: impl FnOnce() -> bool) -> bool {
        if tool == self.active_tool {
            return true;
        }
        if !self.queue.is_empty() {
            if !confirm() {
                return false;
            }
            info!("tool switch confirmed, clearing {} records", self.queue.len());
            self.queue.clear();
        }
        self.crop_session = None;
        self.mask_session = None;
        self.active_tool = tool;
        true
    }

    /// Runs a batch for the active tool over the owned queue.
    pub async fn run_batch<S: ProcessingService>(
        &mut self,
        dispatcher: &BatchDispatcher<S>,
    ) -> Result<(), DispatchError> {
        dispatcher.run_batch(&mut self.queue, self.active_tool).await
    }

    /// Opens a crop session for the record, replacing any session already
    /// open (single-focus UI). The record must have decoded as an image.
    pub fn open_crop(&mut self, id: Uuid) -> Result<&CropSession, WorkbenchError> {
        let record = self.queue.get(id).ok_or(WorkbenchError::TaskNotFound(id))?;
        let preview = record.preview.as_ref().ok_or(WorkbenchError::NotAnImage)?;
        let session = CropSession::new(id, preview.width(), preview.height());
        Ok(self.crop_session.insert(session))
    }

    pub fn crop_session_mut(&mut self) -> Option<&mut CropSession> {
        self.crop_session.as_mut()
    }

    pub fn cancel_crop(&mut self) {
        self.crop_session = None;
    }

    /// Confirms the pending rectangle: extracts it, re-encodes as JPEG under
    /// `cropped_{original}`, swaps it in as the record's source and resets
    /// the record to pending. Failures leave both the record and the session
    /// untouched so the user can retry or cancel.
    pub fn confirm_crop(&mut self) -> Result<Uuid, WorkbenchError> {
        let (id, rect) = match &self.crop_session {
            Some(session) => (session.task_id(), session.rect()),
            None => return Err(WorkbenchError::NoActiveSession),
        };
        let record = self
            .queue
            .get_mut(id)
            .ok_or(WorkbenchError::TaskNotFound(id))?;

        let source = raster::decode(&record.file_bytes)?;
        let cropped = extract(&source, rect)?;
        let bytes = raster::encode_jpeg(&cropped, raster::JPEG_DEFAULT_QUALITY)?;
        let file = InputFile {
            name: format!("cropped_{}", record.file_name),
            mime_type: "image/jpeg".to_string(),
            bytes,
        };
        record.replace_source(file, Some(cropped));
        self.crop_session = None;
        info!("task {} re-sourced from crop, back to pending", id);
        Ok(id)
    }

    /// Opens a mask-authoring session sized to the record's native pixel
    /// dimensions, replacing any open session. Only pending records may be
    /// masked: terminal records re-enter dispatch solely through the
    /// crop-and-resubmit flow.
    pub fn open_mask(&mut self, id: Uuid) -> Result<&mut MaskCanvas, WorkbenchError> {
        let record = self.queue.get(id).ok_or(WorkbenchError::TaskNotFound(id))?;
        if record.status != TaskStatus::Pending {
            return Err(WorkbenchError::TaskNotPending(id));
        }
        let preview = record.preview.as_ref().ok_or(WorkbenchError::NotAnImage)?;
        let session = self.mask_session.insert(MaskSession {
            task_id: id,
            canvas: MaskCanvas::new(preview.width(), preview.height()),
        });
        Ok(&mut session.canvas)
    }

    pub fn mask_canvas_mut(&mut self) -> Option<&mut MaskCanvas> {
        self.mask_session.as_mut().map(|s| &mut s.canvas)
    }

    pub fn cancel_mask(&mut self) {
        self.mask_session = None;
    }

    /// Submits the authored mask through the single-task object-removal
    /// path. The session ends immediately, before the outcome is known.
    pub async fn submit_mask<S: ProcessingService>(
        &mut self,
        dispatcher: &BatchDispatcher<S>,
    ) -> Result<Uuid, WorkbenchError> {
        let session = self
            .mask_session
            .take()
            .ok_or(WorkbenchError::NoActiveSession)?;
        let mask_png = session.canvas.to_png().inspect_err(|e| {
            warn!("mask for task {} could not be serialized: {}", session.task_id, e);
        })?;
        dispatcher
            .dispatch_erase(&mut self.queue, session.task_id, mask_png)
            .await?;
        Ok(session.task_id)
    }
}

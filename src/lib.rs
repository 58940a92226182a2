//! Core engine for a batch file-processing toolbox.
//!
//! Files queue up as [`queue::TaskRecord`]s under one active [`tools::Tool`],
//! a [`dispatch::BatchDispatcher`] sends pending tasks to the Processing
//! Service one at a time, and the [`raster`] module covers the local pixel
//! work: cropping before upload, authoring object-removal masks, and
//! compositing transparent results over a solid background for download.
//! [`workbench::Workbench`] ties the pieces together behind a single-focus
//! session model.

pub mod dispatch;
pub mod queue;
pub mod raster;
pub mod tools;
pub mod workbench;

pub use dispatch::{
    BatchDispatcher, DispatchError, HttpProcessingService, ProcessingService, TransportError,
};
pub use queue::{BackgroundColor, InputFile, TaskQueue, TaskRecord, TaskResult, TaskStatus};
pub use raster::{CropRect, CropSession, ExportedFile, MaskCanvas, RasterError};
pub use tools::Tool;
pub use workbench::{Workbench, WorkbenchError};

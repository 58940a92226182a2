use chrono::Utc;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "error")]
    Error,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl TaskStatus {
    /// Terminal statuses survive for inspection but take no further
    /// automatic transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Error)
    }
}

/// Background selection for compositing a background-removal result.
/// `Transparent` is the sentinel meaning "no compositing, preserve alpha".
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundColor {
    Transparent,
    Solid([u8; 3]),
}

impl Default for BackgroundColor {
    fn default() -> Self {
        BackgroundColor::Transparent
    }
}

/// A raw input file as handed over by the caller.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Result payload written back by a dispatch, whole-record per tool kind.
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    pub bytes: Option<Vec<u8>>,
    pub file_name: Option<String>,
    pub text: Option<String>,
}

impl TaskResult {
    pub fn file(bytes: Vec<u8>, file_name: String) -> Self {
        Self {
            bytes: Some(bytes),
            file_name: Some(file_name),
            text: None,
        }
    }

    pub fn text(text: String) -> Self {
        Self {
            bytes: None,
            file_name: None,
            text: Some(text),
        }
    }
}

/// The unit of work. Owns its source bytes and any derived rasters, so
/// removing or replacing the record releases them with it.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub file_bytes: Vec<u8>,
    /// Decoded preview, present only for image inputs that decode cleanly.
    pub preview: Option<RgbaImage>,
    pub status: TaskStatus,
    pub result_bytes: Option<Vec<u8>>,
    pub result_file_name: Option<String>,
    pub result_text: Option<String>,
    pub background: BackgroundColor,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRecord {
    pub fn new(file: InputFile) -> Self {
        let now = Utc::now().to_rfc3339();
        let preview = if file.mime_type.starts_with("image/") {
            image::load_from_memory(&file.bytes)
                .ok()
                .map(|img| img.to_rgba8())
        } else {
            None
        };
        Self {
            id: Uuid::new_v4(),
            file_name: file.name,
            mime_type: file.mime_type,
            file_bytes: file.bytes,
            preview,
            status: TaskStatus::default(),
            result_bytes: None,
            result_file_name: None,
            result_text: None,
            background: BackgroundColor::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: TaskStatus, result: Option<TaskResult>) {
        self.status = status;
        if let Some(result) = result {
            self.result_bytes = result.bytes;
            self.result_file_name = result.file_name;
            self.result_text = result.text;
        }
        self.touch();
    }

    pub fn set_background(&mut self, color: BackgroundColor) {
        self.background = color;
        self.touch();
    }

    /// Swaps in a new source file (crop confirmation), discarding the old
    /// bytes, preview and any prior result, and resetting to `Pending`.
    pub fn replace_source(&mut self, file: InputFile, preview: Option<RgbaImage>) {
        self.file_name = file.name;
        self.mime_type = file.mime_type;
        self.file_bytes = file.bytes;
        self.preview = preview;
        self.status = TaskStatus::Pending;
        self.result_bytes = None;
        self.result_file_name = None;
        self.result_text = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn image_input_gets_a_preview() {
        let record = TaskRecord::new(InputFile {
            name: "a.png".into(),
            mime_type: "image/png".into(),
            bytes: png_bytes(),
        });
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.background, BackgroundColor::Transparent);
        assert!(record.preview.is_some());
    }

    #[test]
    fn non_image_and_malformed_inputs_omit_the_preview() {
        let pdf = TaskRecord::new(InputFile {
            name: "doc.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: vec![0x25, 0x50, 0x44, 0x46],
        });
        assert!(pdf.preview.is_none());

        let broken = TaskRecord::new(InputFile {
            name: "b.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        });
        assert!(broken.preview.is_none());
        assert_eq!(broken.status, TaskStatus::Pending);
    }

    #[test]
    fn replace_source_discards_result_and_resets_status() {
        let mut record = TaskRecord::new(InputFile {
            name: "a.png".into(),
            mime_type: "image/png".into(),
            bytes: png_bytes(),
        });
        record.set_status(
            TaskStatus::Success,
            Some(TaskResult::file(vec![9, 9], "koukou_a.png".into())),
        );
        record.replace_source(
            InputFile {
                name: "cropped_a.png".into(),
                mime_type: "image/jpeg".into(),
                bytes: vec![1],
            },
            None,
        );
        assert_eq!(record.status, TaskStatus::Pending);
        assert!(record.result_bytes.is_none());
        assert!(record.result_file_name.is_none());
        assert!(record.result_text.is_none());
        assert_eq!(record.file_name, "cropped_a.png");
    }
}

use serde::{Deserialize, Serialize};

/// The four single-purpose processing tools the toolbox routes files through.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    #[serde(rename = "remove-bg")]
    BackgroundRemoval,
    #[serde(rename = "pdf-to-word")]
    DocumentConversion,
    #[serde(rename = "ocr")]
    TextExtraction,
    #[serde(rename = "eraser")]
    ObjectRemoval,
}

/// How a successful Processing Service response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    BinaryImage,
    BinaryDocument,
    PlainText,
}

/// What kind of input files a tool accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputHint {
    Images,
    Pdf,
}

/// Per-tool configuration. Adding a tool is a row in [`TOOL_TABLE`], not a
/// new branch in the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub tool: Tool,
    pub endpoint: &'static str,
    pub result_kind: ResultKind,
    /// Prefix of the derived result filename.
    pub result_prefix: &'static str,
    /// Extension of the derived result filename. Empty when the result name
    /// keeps the original filename verbatim after the prefix.
    pub result_extension: &'static str,
    pub input_hint: InputHint,
    pub label: &'static str,
    pub description: &'static str,
}

static TOOL_TABLE: [ToolSpec; 4] = [
    ToolSpec {
        tool: Tool::BackgroundRemoval,
        endpoint: "/api/remove-bg",
        result_kind: ResultKind::BinaryImage,
        result_prefix: "koukou_",
        result_extension: ".png",
        input_hint: InputHint::Images,
        label: "Background removal",
        description: "Upload images, the background is removed automatically",
    },
    ToolSpec {
        tool: Tool::DocumentConversion,
        endpoint: "/api/pdf-to-word",
        result_kind: ResultKind::BinaryDocument,
        result_prefix: "processed_",
        result_extension: ".docx",
        input_hint: InputHint::Pdf,
        label: "PDF to Word",
        description: "Convert PDF documents into editable Word files",
    },
    ToolSpec {
        tool: Tool::TextExtraction,
        endpoint: "/api/ocr",
        result_kind: ResultKind::PlainText,
        result_prefix: "",
        result_extension: "",
        input_hint: InputHint::Images,
        label: "Screenshot to text",
        description: "Extract text from screenshots and photos",
    },
    ToolSpec {
        tool: Tool::ObjectRemoval,
        endpoint: "/api/magic-eraser",
        result_kind: ResultKind::BinaryImage,
        result_prefix: "erased_",
        result_extension: "",
        input_hint: InputHint::Images,
        label: "Magic eraser",
        description: "Paint over unwanted objects and erase them",
    },
];

impl Tool {
    pub fn spec(&self) -> &'static ToolSpec {
        TOOL_TABLE
            .iter()
            .find(|spec| spec.tool == *self)
            .expect("every Tool variant has a table row")
    }

    pub fn all() -> &'static [ToolSpec] {
        &TOOL_TABLE
    }
}

/// Filename without everything from the first dot on, matching the result
/// naming convention (`photo.final.png` -> `photo`).
pub fn file_stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_spec_row() {
        for tool in [
            Tool::BackgroundRemoval,
            Tool::DocumentConversion,
            Tool::TextExtraction,
            Tool::ObjectRemoval,
        ] {
            assert_eq!(tool.spec().tool, tool);
        }
    }

    #[test]
    fn endpoints_match_service_contract() {
        assert_eq!(Tool::BackgroundRemoval.spec().endpoint, "/api/remove-bg");
        assert_eq!(Tool::DocumentConversion.spec().endpoint, "/api/pdf-to-word");
        assert_eq!(Tool::TextExtraction.spec().endpoint, "/api/ocr");
        assert_eq!(Tool::ObjectRemoval.spec().endpoint, "/api/magic-eraser");
    }

    #[test]
    fn stem_drops_everything_after_first_dot() {
        assert_eq!(file_stem("photo.png"), "photo");
        assert_eq!(file_stem("photo.final.png"), "photo");
        assert_eq!(file_stem("noext"), "noext");
    }
}

use std::path::Path;
use std::time::UNIX_EPOCH;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Largest file the CLI will inline as a data-URL preview.
const MAX_PREVIEW_BYTES: u64 = 512 * 1024;

/// A student's answer to one question. The shape depends on the question type: one option
/// (or free text) is a string, multi choice is a list, an upload is file metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerData {
    Text(String),
    Choices(Vec<String>),
    File(FileAnswer),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FileAnswer {
    #[validate(length(min = 1, max = 255, message = "file name must be 1-255 characters"))]
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(rename = "lastModified", default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavedAnswer {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub question_id: Uuid,
    #[serde(default)]
    pub answer_data: Option<AnswerData>,
}

#[derive(Debug, Serialize)]
pub struct SaveAnswerRequest<'a> {
    pub question_id: Uuid,
    pub answer_data: &'a AnswerData,
}

impl AnswerData {
    pub fn single_choice(option: impl Into<String>) -> Self {
        Self::Text(option.into())
    }

    pub fn multi_choice<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choices(options.into_iter().map(Into::into).collect())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            AnswerData::File(file) => file.validate(),
            _ => Ok(()),
        }
    }

    /// The value sent to the server. Inline previews stay local.
    pub fn to_wire(&self) -> AnswerData {
        match self {
            AnswerData::File(file) if file.preview.is_some() => {
                AnswerData::File(FileAnswer { preview: None, ..file.clone() })
            }
            other => other.clone(),
        }
    }

    /// Normalized option strings used for order-insensitive comparison.
    pub fn option_strings(&self) -> Vec<String> {
        match self {
            AnswerData::Text(value) => vec![value.clone()],
            AnswerData::Choices(values) => values.clone(),
            AnswerData::File(file) => vec![file.name.clone()],
            AnswerData::Other(value) => value_strings(value),
        }
    }

    pub fn display(&self) -> String {
        match self {
            AnswerData::Text(value) => value.clone(),
            AnswerData::Choices(values) => values.join(", "),
            AnswerData::File(file) => format!("File: {}", file.name),
            AnswerData::Other(value) => display_value(value),
        }
    }
}

impl FileAnswer {
    /// Reads metadata from disk. The preview is only inlined for small images.
    pub fn from_path(path: &Path, with_preview: bool) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|value| value.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|value| value.duration_since(UNIX_EPOCH).ok())
            .map(|value| value.as_millis() as i64);

        let preview = if with_preview
            && mime_type.starts_with("image/")
            && metadata.len() <= MAX_PREVIEW_BYTES
        {
            let bytes = std::fs::read(path)?;
            Some(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
        } else {
            None
        };

        Ok(Self { name, size: metadata.len(), mime_type, last_modified, preview })
    }
}

pub(crate) fn value_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(scalar_string).collect(),
        other => vec![scalar_string(other)],
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(scalar_string).collect::<Vec<_>>().join(", "),
        Value::Object(map) => match map.get("name").and_then(Value::as_str) {
            Some(name) => format!("File: {name}"),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

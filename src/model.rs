use crate::error::Error;
use bytes::Bytes;
use serde::Serialize;

pub const PLACEHOLDER_CATEGORY: &str = "Auto-detected";
pub const PLACEHOLDER_TITLE: &str = "Extracted Title";

const CATEGORY_LABELS: &[&str] = &["issue category", "category"];
const TITLE_LABELS: &[&str] = &["issue title", "title"];

/// An image received in a single request. Lives only as long as that request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Bytes,
    pub media_type: String,
}

impl UploadedFile {
    /// Accepts `bytes` only if they look like an image.
    ///
    /// The sniffed type wins over whatever the client declared; the declared
    /// type is only consulted for formats `infer` does not recognize.
    pub fn image(bytes: Bytes, declared: Option<&str>) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::BadRequest("Uploaded file is empty".to_owned()));
        }

        let media_type = match infer::get(&bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
                kind.mime_type().to_owned()
            }
            Some(kind) => {
                return Err(Error::BadRequest(format!(
                    "Uploaded file is not an image ({})",
                    kind.mime_type()
                )))
            }
            None => match declared {
                Some(declared) if declared.starts_with("image/") => declared.to_owned(),
                _ => {
                    return Err(Error::BadRequest(
                        "Uploaded file is not a recognized image".to_owned(),
                    ))
                }
            },
        };

        Ok(Self { bytes, media_type })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub category: String,
    pub title: String,
    pub description: String,
}

impl ExtractionResult {
    /// Builds a result from the model's free-text answer.
    ///
    /// `description` is always the answer verbatim. Category and title are
    /// picked from labelled lines such as `**Issue Category:** Pothole` and
    /// fall back to placeholders when the model did not label them.
    pub fn from_model_output(text: &str) -> Self {
        let category = find_labelled(text, CATEGORY_LABELS);
        let title = find_labelled(text, TITLE_LABELS);

        Self {
            category: category.unwrap_or_else(|| PLACEHOLDER_CATEGORY.to_owned()),
            title: title.unwrap_or_else(|| PLACEHOLDER_TITLE.to_owned()),
            description: text.to_owned(),
        }
    }
}

fn find_labelled(text: &str, labels: &[&str]) -> Option<String> {
    text.lines().find_map(|line| labelled_value(line, labels))
}

fn labelled_value(line: &str, labels: &[&str]) -> Option<String> {
    let line = line.trim_start_matches(|c: char| {
        c.is_whitespace() || c.is_ascii_digit() || matches!(c, '#' | '-' | '*' | '.' | ')')
    });
    let (key, value) = line.split_once(':')?;

    let key = key.trim().trim_matches('*').trim().to_lowercase();
    if !labels.contains(&key.as_str()) {
        return None;
    }

    let value = value.trim().trim_matches('*').trim();
    (!value.is_empty()).then(|| value.to_owned())
}

//! Wire types for the upload API plus the chapter draft sent at commit.

use crate::discover::ChapterDescriptor;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `{ data: { id } }` envelope returned by begin, probe and commit
#[derive(Debug, Deserialize)]
pub struct IdEnvelope {
    pub data: IdData,
}

#[derive(Debug, Deserialize)]
pub struct IdData {
    pub id: String,
}

/// Error body: `{ errors: [ { detail } ] }`
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Batch upload response: `{ data: [ { id, attributes: { originalFileName } } ] }`
#[derive(Debug, Deserialize)]
pub struct BatchEnvelope {
    pub data: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub attributes: UploadedFileAttributes,
}

#[derive(Debug, Deserialize)]
pub struct UploadedFileAttributes {
    #[serde(rename = "originalFileName")]
    pub original_file_name: String,
}

/// A page the platform accepted, paired with the filename it was sent as.
/// The committed page order is derived from these filenames, never from the
/// server's response order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUploadResult {
    pub remote_page_id: String,
    pub original_filename: String,
}

#[derive(Debug, Serialize)]
pub struct BeginSessionRequest<'a> {
    pub manga: &'a str,
    pub groups: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest<'a> {
    pub chapter_draft: &'a ChapterDraft,
    pub page_order: &'a [String],
}

/// Chapter metadata submitted at commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDraft {
    pub volume: Option<String>,
    pub chapter: Option<String>,
    pub translated_language: String,
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<String>,
}

impl ChapterDraft {
    pub fn from_descriptor(descriptor: &ChapterDescriptor) -> Self {
        ChapterDraft {
            volume: sanitize_value(descriptor.volume.as_deref()),
            chapter: sanitize_value(descriptor.chapter.as_deref()),
            translated_language: descriptor.language.clone(),
            title: descriptor.chapter_title.clone(),
            publish_at: descriptor.publish_date.clone(),
        }
    }
}

/// Normalize a chapter/volume value to the platform's numeric-string form:
/// no insignificant leading zeros, at most two decimal places, an optional
/// single trailing letter ("5.0" -> "5", "05b" -> "5b"). Unparseable or
/// absent values become `None`, never the literal text "null".
pub fn sanitize_value(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    let shape = Regex::new(r"^(\d+)(?:\.(\d{1,2}))?([A-Za-z])?$").unwrap();
    let caps = shape.captures(raw)?;

    let integer = caps.get(1).map(|m| m.as_str()).unwrap_or("0");
    let integer = integer.trim_start_matches('0');
    let integer = if integer.is_empty() { "0" } else { integer };

    let fraction = caps
        .get(2)
        .map(|m| m.as_str().trim_end_matches('0'))
        .unwrap_or("");
    let suffix = caps.get(3).map(|m| m.as_str()).unwrap_or("");

    if fraction.is_empty() {
        Some(format!("{integer}{suffix}"))
    } else {
        Some(format!("{integer}.{fraction}{suffix}"))
    }
}

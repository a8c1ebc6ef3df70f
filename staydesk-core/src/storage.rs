//! Object storage naming for guest uploads. The bucket itself is external;
//! this module only decides where a file goes and whether a submitted URL
//! belongs to the booking.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::guest::DocumentType;
use crate::validation::Validator;
use crate::CoreResult;

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "application/pdf"];
const MAX_FILENAME_LEN: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub file_type: DocumentType,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadTicket {
    pub path: String,
    pub public_url: String,
    pub content_type: String,
}

pub fn booking_prefix(booking_id: Uuid) -> String {
    format!("bookings/{}/", booking_id)
}

/// `bookings/{id}/{fileType}_{timestamp}_{filename}`
pub fn object_path(booking_id: Uuid, file_type: DocumentType, timestamp_ms: i64, filename: &str) -> String {
    format!(
        "{}{}_{}_{}",
        booking_prefix(booking_id),
        file_type.path_segment(),
        timestamp_ms,
        sanitize_filename(filename)
    )
}

/// Keeps only the basename and replaces anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let mut cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    while cleaned.starts_with('.') {
        cleaned.remove(0);
    }
    if cleaned.is_empty() {
        cleaned = "upload".to_string();
    }
    if cleaned.len() > MAX_FILENAME_LEN {
        // keep the extension when truncating
        let ext = cleaned.rsplit_once('.').map(|(_, e)| e.to_string()).filter(|e| e.len() <= 10);
        cleaned.truncate(MAX_FILENAME_LEN);
        if let Some(ext) = ext {
            if !cleaned.ends_with(&format!(".{}", ext)) {
                cleaned.truncate(MAX_FILENAME_LEN - ext.len() - 1);
                cleaned.push('.');
                cleaned.push_str(&ext);
            }
        }
    }
    cleaned
}

pub fn public_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

pub fn prepare_upload(
    booking_id: Uuid,
    request: &UploadRequest,
    timestamp_ms: i64,
    base_url: &str,
    max_bytes: u64,
) -> CoreResult<UploadTicket> {
    let mut v = Validator::new();
    v.require("filename", &request.filename);
    v.check(
        ALLOWED_CONTENT_TYPES.contains(&request.content_type.as_str()),
        "content_type",
        "only JPEG, PNG and PDF files are accepted",
    );
    v.check(request.size_bytes > 0, "size_bytes", "file is empty");
    v.check(request.size_bytes <= max_bytes, "size_bytes", "file is too large");
    v.finish()?;

    let path = object_path(booking_id, request.file_type, timestamp_ms, &request.filename);
    Ok(UploadTicket {
        public_url: public_url(base_url, &path),
        path,
        content_type: request.content_type.clone(),
    })
}

/// True when `url` points into this booking's folder of the bucket.
pub fn is_booking_object(base_url: &str, booking_id: Uuid, url: &str) -> bool {
    let prefix = public_url(base_url, &booking_prefix(booking_id));
    url.starts_with(&prefix) && url.len() > prefix.len() && !url[prefix.len()..].contains("..")
}

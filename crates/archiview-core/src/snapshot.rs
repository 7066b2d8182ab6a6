//! Snapshot export naming

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::viewer::ImageFormat;

/// A captured still ready to be offered as a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl SnapshotFile {
    pub fn new(model_id: &str, format: ImageFormat, bytes: Vec<u8>) -> Self {
        Self {
            filename: snapshot_filename(model_id, format, Utc::now(), Uuid::new_v4()),
            mime_type: format.mime_type(),
            bytes,
        }
    }
}

/// `archiview-<model-id>-<UTC timestamp>-<8 hex>.<ext>`
///
/// Characters outside `[A-Za-z0-9_-]` in the model id become `_` so the name
/// is safe on every filesystem.
pub fn snapshot_filename(
    model_id: &str,
    format: ImageFormat,
    taken_at: DateTime<Utc>,
    nonce: Uuid,
) -> String {
    let safe_id: String = model_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let suffix: String = nonce.simple().to_string().chars().take(8).collect();

    format!(
        "archiview-{}-{}-{}.{}",
        safe_id,
        taken_at.format("%Y%m%dT%H%M%S%3fZ"),
        suffix,
        format.extension()
    )
}

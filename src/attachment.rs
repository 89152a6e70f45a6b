//! Files sent along with a question, e.g. a judgment as a PDF or a
//! photo of course notes.
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use thiserror::Error;

use crate::gemini::Part;

/// Inline data sent to the service is capped at 20MB per request.
pub const MAX_ATTACHMENT_BYTES: usize = 20 * 1024 * 1024;

/// An attachment that couldn't be prepared. The message it belongs to
/// is not sent.
#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("could not read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported file type for {0}, only PDF and image files can be attached")]
    UnsupportedType(String),
    #[error("{name} is {size} bytes, the limit is {limit} bytes")]
    TooLarge {
        name: String,
        size: usize,
        limit: usize,
    },
    #[error("attachment data is not valid base64")]
    InvalidEncoding(#[from] base64::DecodeError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    /// Standard base64 of the file contents
    pub data: String,
}

impl Attachment {
    /// Read and encode a file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_type_for(&file_name)
            .ok_or_else(|| AttachmentError::UnsupportedType(file_name.clone()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AttachmentError::Unreadable {
                path: path.display().to_string(),
                source,
            })?;
        check_size(&file_name, bytes.len())?;

        Ok(Self {
            file_name,
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        })
    }

    /// Build an attachment from data that was already encoded, e.g. by
    /// a browser. A `data:` URL prefix is accepted and dropped. When no
    /// mime type is given it is inferred from the file name.
    pub fn from_base64(
        file_name: &str,
        mime_type: Option<&str>,
        data: &str,
    ) -> Result<Self, AttachmentError> {
        let mime_type = match mime_type {
            Some(m) if is_supported(m) => m.to_string(),
            Some(_) => return Err(AttachmentError::UnsupportedType(file_name.to_string())),
            None => mime_type_for(file_name)
                .ok_or_else(|| AttachmentError::UnsupportedType(file_name.to_string()))?
                .to_string(),
        };
        let data = match data.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => data,
        };
        let decoded = STANDARD.decode(data.trim())?;
        check_size(file_name, decoded.len())?;

        Ok(Self {
            file_name: file_name.to_string(),
            mime_type,
            data: data.trim().to_string(),
        })
    }

    pub fn to_part(&self) -> Part {
        Part::inline_data(&self.mime_type, &self.data)
    }

    /// How the student's message is recorded when it came with a file.
    pub fn label(&self, text: &str) -> String {
        format!("[Fichier: {}] {}", self.file_name, text)
    }
}

fn check_size(name: &str, size: usize) -> Result<(), AttachmentError> {
    if size > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge {
            name: name.to_string(),
            size,
            limit: MAX_ATTACHMENT_BYTES,
        });
    }
    Ok(())
}

fn is_supported(mime_type: &str) -> bool {
    mime_type == "application/pdf" || mime_type.starts_with("image/")
}

fn mime_type_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    let mime_type = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => return None,
    };
    Some(mime_type)
}

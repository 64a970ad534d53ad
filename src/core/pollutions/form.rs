//! Pollution form extraction
//!
//! Create and update requests arrive either as `multipart/form-data` (text
//! fields plus an optional `photo` file) or as a JSON object without a photo.
//! Both are reduced to the same [`FormFields`] for validation.

use axum::{
    Json,
    extract::{FromRef, FromRequest, Multipart, Request, multipart::MultipartError},
    http::{StatusCode, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::core::db::models::StoredPhoto;
use crate::core::pollutions::api::PollutionApiError;
use crate::core::validation::{FormFields, ValidationErrors};

/// Name of the multipart file field
pub const PHOTO_FIELD: &str = "photo";

/// Accepted photo MIME types
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Accepted photo file extensions
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Maximum photo size in bytes, provided by the router state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimit(pub usize);

/// Photo upload errors
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Only JPEG, PNG and WebP images are allowed")]
    InvalidFileType,

    #[error("File too large (maximum {max} bytes)")]
    FileTooLarge { max: usize },

    #[error("Only one photo can be uploaded")]
    TooManyFiles,

    #[error("Malformed upload: {0}")]
    Malformed(String),

    #[error("Expected multipart/form-data or application/json")]
    UnsupportedContentType,
}

/// Uploaded photo held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl PhotoUpload {
    /// Base64 form stored alongside the pollution
    pub fn to_stored(&self) -> StoredPhoto {
        StoredPhoto {
            data: STANDARD.encode(&self.bytes),
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Both the MIME type and the file extension must be image types we accept
pub fn check_photo_type(mime_type: &str, file_name: &str) -> Result<(), UploadError> {
    let mime_ok = ALLOWED_MIME_TYPES.contains(&mime_type.to_lowercase().as_str());

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    let extension_ok = ALLOWED_EXTENSIONS.contains(&extension.as_str());

    if mime_ok && extension_ok {
        Ok(())
    } else {
        Err(UploadError::InvalidFileType)
    }
}

/// Text fields and optional photo of a pollution form
#[derive(Debug, Clone, Default)]
pub struct PollutionForm {
    pub fields: FormFields,
    pub photo: Option<PhotoUpload>,
}

impl<S> FromRequest<S> for PollutionForm
where
    UploadLimit: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PollutionApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let UploadLimit(limit) = UploadLimit::from_ref(state);
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| UploadError::Malformed(e.body_text()))?;
            Ok(read_multipart(multipart, limit).await?)
        } else if content_type.starts_with("application/json") {
            let Json(value) = Json::<serde_json::Value>::from_request(req, state)
                .await
                .map_err(|e| ValidationErrors::single("body", e.body_text()))?;
            Ok(PollutionForm {
                fields: FormFields::from_json(value)?,
                photo: None,
            })
        } else {
            Err(UploadError::UnsupportedContentType.into())
        }
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::FileTooLarge { max: limit }
    } else {
        UploadError::Malformed(err.body_text())
    }
}

async fn read_multipart(mut multipart: Multipart, limit: usize) -> Result<PollutionForm, UploadError> {
    let mut form = PollutionForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name != PHOTO_FIELD {
            let text = field.text().await.map_err(|e| multipart_error(e, limit))?;
            form.fields.insert_text(name, text);
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        // Browsers send an empty file part when no file was chosen
        if file_name.is_empty() {
            continue;
        }
        if form.photo.is_some() {
            return Err(UploadError::TooManyFiles);
        }

        let mime_type = field.content_type().unwrap_or_default().to_lowercase();
        check_photo_type(&mime_type, &file_name)?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            if bytes.len() + chunk.len() > limit {
                return Err(UploadError::FileTooLarge { max: limit });
            }
            bytes.extend_from_slice(&chunk);
        }

        form.photo = Some(PhotoUpload {
            bytes,
            mime_type,
            file_name,
        });
    }

    Ok(form)
}

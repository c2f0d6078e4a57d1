use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;

/// Errors that can occur during multipart extraction — used by the audio
/// transcription endpoint to pull the uploaded file and form fields.
#[derive(Debug)]
pub enum MultipartError {
    MissingField(String),
    AxumError(String),
    ReadError(String),
}

impl std::fmt::Display for MultipartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(name) => write!(f, "missing required field: {name}"),
            Self::AxumError(msg) => write!(f, "multipart error: {msg}"),
            Self::ReadError(msg) => write!(f, "failed to read field data: {msg}"),
        }
    }
}

impl IntoResponse for MultipartError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// A file received from a multipart form upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Collected fields from a multipart form, keyed by field name.
pub struct MultipartFields {
    pub text: HashMap<String, Vec<String>>,
    pub files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartFields {
    pub async fn collect_from(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut text: HashMap<String, Vec<String>> = HashMap::new();
        let mut files: HashMap<String, Vec<UploadedFile>> = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| MultipartError::AxumError(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(|s| s.to_string());
            let content_type = field.content_type().map(|s| s.to_string());

            let data = field
                .bytes()
                .await
                .map_err(|e| MultipartError::ReadError(e.to_string()))?;

            if file_name.is_some() {
                files.entry(name.clone()).or_default().push(UploadedFile {
                    name,
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let text_value = String::from_utf8(data.to_vec())
                    .map_err(|e| MultipartError::ReadError(e.to_string()))?;
                text.entry(name).or_default().push(text_value);
            }
        }

        Ok(Self { text, files })
    }

    pub fn take_text(&mut self, name: &str) -> Result<String, MultipartError> {
        self.text
            .get_mut(name)
            .and_then(|v| if v.is_empty() { None } else { Some(v.remove(0)) })
            .ok_or_else(|| MultipartError::MissingField(name.to_string()))
    }

    pub fn take_text_opt(&mut self, name: &str) -> Option<String> {
        self.text
            .get_mut(name)
            .and_then(|v| if v.is_empty() { None } else { Some(v.remove(0)) })
    }

    pub fn take_file(&mut self, name: &str) -> Result<UploadedFile, MultipartError> {
        self.files
            .get_mut(name)
            .and_then(|v| if v.is_empty() { None } else { Some(v.remove(0)) })
            .ok_or_else(|| MultipartError::MissingField(name.to_string()))
    }
}

/// Extractor consuming a `multipart/form-data` request body into
/// [`MultipartFields`]. Used directly rather than via a derive macro since
/// the gateway has exactly one multipart route (audio transcription).
pub struct TypedMultipart(pub MultipartFields);

impl<S: Send + Sync> FromRequest<S> for TypedMultipart {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| MultipartError::AxumError(rejection.body_text()).into_response())?;

        let fields = MultipartFields::collect_from(multipart)
            .await
            .map_err(|e| e.into_response())?;

        Ok(TypedMultipart(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploaded_file_len_and_empty() {
        let file = UploadedFile {
            name: "audio".into(),
            file_name: Some("clip.wav".into()),
            content_type: Some("audio/wav".into()),
            data: Bytes::from_static(b"RIFF"),
        };
        assert_eq!(file.len(), 4);
        assert!(!file.is_empty());
    }

    #[test]
    fn take_text_errors_on_missing_field() {
        let mut fields = MultipartFields {
            text: HashMap::new(),
            files: HashMap::new(),
        };
        let err = fields.take_text("model").unwrap_err();
        assert!(matches!(err, MultipartError::MissingField(name) if name == "model"));
    }

    #[test]
    fn take_text_removes_value() {
        let mut text = HashMap::new();
        text.insert("model".to_string(), vec!["whisper-large".to_string()]);
        let mut fields = MultipartFields {
            text,
            files: HashMap::new(),
        };
        assert_eq!(fields.take_text("model").unwrap(), "whisper-large");
        assert!(fields.take_text_opt("model").is_none());
    }
}

//! POST /api/ask - submit a question

use axum::{extract::State, Extension, Json};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use super::auth::CurrentSession;
use crate::error::{ApiError, ApiResult};
use crate::services::{prepare_upload, DisplayResult, Submission, MAX_IMAGE_BYTES};
use crate::AppState;

/// Request body cap: a maximal image in base64 plus room for the prompt
pub const ASK_BODY_LIMIT: usize = MAX_IMAGE_BYTES / 3 * 4 + 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct ImageUpload {
    /// Base64 (standard alphabet) file content
    pub data: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub image: Option<ImageUpload>,
}

pub async fn ask(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Json(body): Json<AskRequest>,
) -> ApiResult<Json<DisplayResult>> {
    let prompt = body.prompt.filter(|p| !p.trim().is_empty());

    let image = match body.image {
        Some(upload) => {
            let bytes = BASE64
                .decode(upload.data.trim())
                .map_err(|e| ApiError::BadRequest(format!("Image is not valid base64: {}", e)))?;
            Some(prepare_upload(
                bytes,
                upload.mime_type.as_deref(),
                upload.file_name.as_deref(),
            )?)
        }
        None => None,
    };

    if prompt.is_none() && image.is_none() {
        return Err(ApiError::BadRequest(
            "Ask a question or attach an image".to_string(),
        ));
    }

    // One submission at a time per session
    let mut session = current.handle.lock().await;
    let result = state
        .governor
        .submit(&mut session, Submission { prompt, image })
        .await?;

    Ok(Json(result))
}

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ErrorDetails};
use super::validation::validate_http_url;
use crate::storage::SpooledUpload;
use crate::AppState;

/// Multipart field carrying photo files
const PHOTOS_FIELD: &str = "photos";

#[derive(Debug, Deserialize)]
pub struct UploadByLinkRequest {
    #[serde(default)]
    pub link: String,
}

/// POST /upload-by-link
pub async fn upload_by_link(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UploadByLinkRequest>, JsonRejection>,
) -> Result<Json<String>, ApiError> {
    let Json(request) = body?;
    validate_http_url(&request.link).map_err(|e| ApiError::validation_field("link", e))?;

    let url = state.uploads.upload_from_remote_url(&request.link).await?;

    info!(source = %request.link, url = %url, "Uploaded photo by link");
    Ok(Json(url))
}

/// POST /upload
///
/// Returns one URL per `photos` file, in submission order.
pub async fn upload_photos(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<String>>, ApiError> {
    let max_files = state.config.upload.max_files;
    let mut spooled: Vec<SpooledUpload> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
    {
        if field.name() != Some(PHOTOS_FIELD) {
            continue;
        }

        if spooled.len() >= max_files {
            return Err(ApiError::bad_request(format!(
                "Too many files (max {})",
                max_files
            )));
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;

        spooled.push(
            state
                .uploads
                .spool(&original_name, content_type.as_deref(), Vec::from(data))
                .await?,
        );
    }

    let urls = state
        .uploads
        .upload_spooled(&spooled)
        .await
        .map_err(|(index, e)| {
            let mut details = HashMap::new();
            details.insert("index".to_string(), serde_json::json!(index));
            details.insert(
                "file".to_string(),
                serde_json::json!(spooled[index].original_name),
            );
            ApiError::from(e).with_details(ErrorDetails::Generic(details))
        })?;

    info!(count = urls.len(), store = state.uploads.store_name(), "Uploaded photos");
    Ok(Json(urls))
}

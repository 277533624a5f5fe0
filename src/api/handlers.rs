// Route handlers. Thin: validation and all decisions live in the orchestrator.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use super::error::ApiError;
use super::state::AppState;
use crate::downloader::errors::DownloadError;
use crate::downloader::models::{DownloadOutcome, DownloadRequest, InspectResult, Job};

#[derive(Debug, Deserialize)]
pub struct InfoBody {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub message: String,
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    pub version: Option<String>,
}

pub async fn info(
    State(state): State<Arc<AppState>>,
    body: Result<Json<InfoBody>, JsonRejection>,
) -> Result<Json<InspectResult>, ApiError> {
    let Json(body) = body?;
    let result = state.orchestrator().inspect(&body.url).await?;
    Ok(Json(result))
}

/// Runs the download on its own task so a dropped connection does not
/// abort the transfer; progress stays pollable either way.
pub async fn download(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<DownloadOutcome>, ApiError> {
    let Json(request) = body?;

    let outcome = tokio::spawn(async move { state.orchestrator().start(&request).await })
        .await
        .map_err(|e| ApiError::from(DownloadError::Internal(e.to_string())))??;

    Ok(Json(outcome))
}

pub async fn progress(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Json<Job> {
    Json(state.orchestrator().progress(&job_id))
}

pub async fn file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state.orchestrator().resolve_file(&filename).await?;
    let file = tokio::fs::File::open(&path).await.map_err(DownloadError::from)?;
    let length = file.metadata().await.map_err(DownloadError::from)?.len();

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type_for(&path)));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&filename))
            .map_err(|_| ApiError::internal("Cabeçalho de download inválido"))?,
    );

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

pub async fn cleanup(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let removed = state.orchestrator().cleanup().await?;
    Ok(Json(CleanupResponse {
        message: format!("{} arquivos removidos", removed),
        removed,
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        provider: state.orchestrator().provider().name().to_string(),
        version: state.provider_version().map(str::to_string),
    })
}

fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("opus") | Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// ASCII fallback name plus the exact UTF-8 name (RFC 6266)
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(filename)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("Canção \"ao vivo\".mp3"),
            "attachment; filename=\"Can__o _ao vivo_.mp3\"; \
             filename*=UTF-8''Can%C3%A7%C3%A3o%20%22ao%20vivo%22.mp3"
        );
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for(FsPath::new("a_720p.mp4")), "video/mp4");
        assert_eq!(content_type_for(FsPath::new("a.MP3")), "audio/mpeg");
        assert_eq!(content_type_for(FsPath::new("a")), "application/octet-stream");
    }
}

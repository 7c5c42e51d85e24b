//! HTTP surface: health check, format listing and the convert endpoint.

use crate::catalog::{FormatCatalog, FormatId};
use crate::error::ConversionError;
use crate::router::{ConversionResult, ConversionRouter};
use crate::upload::{self, StagedUpload};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ConversionRouter>,
    pub upload_dir: Arc<PathBuf>,
}

pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/supported-formats", get(supported_formats))
        .route("/api/convert", post(convert_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

/// The full compatibility matrix.
async fn supported_formats(State(state): State<AppState>) -> Json<FormatCatalog> {
    Json(state.router.catalog().clone())
}

/// Upload a file and get it back in `output_format`.
async fn convert_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<ConvertedFile, ApiError> {
    let mut filename = String::new();
    let mut file_data = Vec::new();
    let mut output_format = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().unwrap_or_default().to_string();
                file_data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Multipart(format!("Failed to read file: {}", e)))?
                    .to_vec();
            }
            "output_format" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Multipart(e.to_string()))?;
                output_format = FormatId::parse(&text);
            }
            _ => {}
        }
    }

    if filename.is_empty() {
        return Err(ConversionError::MissingInput { what: "file" }.into());
    }
    let output = output_format.ok_or(ConversionError::MissingInput {
        what: "output format",
    })?;
    let input = FormatId::from_filename(&filename).ok_or(ConversionError::UnknownFormat {
        format: String::new(),
    })?;

    state.router.validate(&input, &output)?;

    let request_id = uuid::Uuid::new_v4();
    info!(
        "[{}] Received {} ({} bytes): {} -> {}",
        request_id,
        filename,
        file_data.len(),
        input,
        output
    );

    let stem = upload::file_stem(&filename);
    let router = state.router.clone();
    let upload_dir = state.upload_dir.clone();

    let result = tokio::task::spawn_blocking(move || -> Result<ConversionResult, ConversionError> {
        let span = info_span!("convert", %request_id);
        let _guard = span.enter();

        let staged = StagedUpload::stage(&upload_dir, &input, &file_data)?;
        let result = router.convert(staged.path(), &input, &output);
        staged.remove();
        result
    })
    .await
    .map_err(|e| {
        error!("[{}] Conversion task failed: {}", request_id, e);
        ApiError::Internal(format!("Conversion task failed: {}", e))
    })??;

    info!(
        "[{}] Conversion complete: {} bytes of {}",
        request_id,
        result.bytes.len(),
        result.format
    );
    Ok(ConvertedFile {
        file_name: result.file_name(&stem),
        result,
    })
}

// ============================================================================
// Responses
// ============================================================================

/// A successful conversion, sent back as an attachment.
pub struct ConvertedFile {
    file_name: String,
    result: ConversionResult,
}

impl IntoResponse for ConvertedFile {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.file_name);
        (
            [
                (header::CONTENT_TYPE, self.result.content_type().to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.result.bytes,
        )
            .into_response()
    }
}

#[derive(Debug)]
pub enum ApiError {
    Conversion(ConversionError),
    Multipart(String),
    Internal(String),
}

impl From<ConversionError> for ApiError {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Conversion(e) => {
                let status = if e.is_validation() {
                    info!("Rejected request: {}", e);
                    StatusCode::BAD_REQUEST
                } else if e.kind() == crate::error::ErrorKind::CodecFailure {
                    warn!("Conversion failed: {}", e);
                    StatusCode::UNPROCESSABLE_ENTITY
                } else {
                    error!("Conversion failed: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, json!({ "error": e.to_string(), "kind": e.kind() }))
            }
            Self::Multipart(msg) => {
                info!("Malformed upload: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": format!("Multipart error: {}", msg), "kind": "bad_request" }),
                )
            }
            Self::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": msg, "kind": "internal" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionSettings;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "converter-test-boundary";

    fn test_app() -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            router: Arc::new(ConversionRouter::standard(ConversionSettings::default())),
            upload_dir: Arc::new(dir.path().to_path_buf()),
        };
        (app(state, 10 * 1024 * 1024), dir)
    }

    /// Build a multipart body with an optional file part and output format.
    fn multipart_body(file: Option<(&str, &[u8])>, output_format: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some((name, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(format) = output_format {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"output_format\"\r\n\r\n{format}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn post_convert(app: Router, body: Vec<u8>) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri("/api/convert")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        app.oneshot(request).await.unwrap()
    }

    async fn error_kind(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
        body["kind"].as_str().unwrap().to_string()
    }

    fn upload_dir_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_supported_formats_lists_matrix() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/supported-formats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let txt: Vec<&str> = body["txt"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(txt, vec!["pdf", "docx"]);
        assert!(body["xlsx"].is_null());
    }

    #[tokio::test]
    async fn test_convert_text_to_pdf() {
        let (app, dir) = test_app();
        let body = multipart_body(Some(("My Notes.txt", b"hello\nworld\n")), Some("PDF"));
        let response = post_convert(app, body).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"My_Notes.pdf\""
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert!(upload_dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_missing_file_is_bad_request() {
        let (app, _dir) = test_app();
        let response = post_convert(app, multipart_body(None, Some("pdf"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(response).await, "missing_input");
    }

    #[tokio::test]
    async fn test_missing_output_format_is_bad_request() {
        let (app, _dir) = test_app();
        let response = post_convert(app, multipart_body(Some(("a.txt", b"x")), None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(response).await, "missing_input");
    }

    #[tokio::test]
    async fn test_filename_without_extension() {
        let (app, _dir) = test_app();
        let response = post_convert(app, multipart_body(Some(("file", b"data")), Some("pdf"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(response).await, "unknown_format");
    }

    #[tokio::test]
    async fn test_text_to_jpg_is_unsupported() {
        let (app, dir) = test_app();
        let response =
            post_convert(app, multipart_body(Some(("notes.txt", b"hi")), Some("jpg"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(response).await, "unsupported_pair");
        assert!(upload_dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_cleans_up_upload() {
        let (app, dir) = test_app();
        let body = multipart_body(
            Some(("broken.pdf", b"%PDF-1.7\nthis is not really a pdf\n")),
            Some("txt"),
        );
        let response = post_convert(app, body).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_kind(response).await, "codec_failure");
        assert!(upload_dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_uppercase_png_to_pdf() {
        let (app, _dir) = test_app();
        let mut png = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([0, 128, 255])))
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();

        let body = multipart_body(Some(("photo.PNG", png.get_ref())), Some("pdf"));
        let response = post_convert(app, body).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"photo.pdf\""
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page = doc.get_dictionary(pages[&1]).unwrap();
        let media_box: Vec<i64> = page
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_i64().unwrap())
            .collect();
        assert_eq!(media_box, vec![0, 0, 40, 30]);
    }
}

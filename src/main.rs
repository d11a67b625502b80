//! SmartOCR Backend - image/text to DOCX conversion server.

mod config;
mod docx;
mod docx_text;
mod error;
mod layout;
mod ocr;
mod preprocess;
mod scratch;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::AppConfig;
use error::ApiError;
use layout::{classify_page, ClassifiedPage};
use ocr::{Recognizer, TesseractEngine};
use scratch::ScratchFile;

const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<AppConfig>,
    recognizer: Arc<Recognizer>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "smartocr_backend=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Resolve the OCR engine once; a missing binary is fatal at startup
    let engine = TesseractEngine::resolve(config.tesseract_cmd.as_deref())?;
    info!("tesseract engine: {:?}", engine.cmd());

    let bind_addr = config.bind_addr.clone();
    let recognizer = Recognizer::new(engine, &config);
    let state = AppState {
        config: Arc::new(config),
        recognizer: Arc::new(recognizer),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/ocr", post(ocr_endpoint))
        .route("/image-to-docx", post(image_to_docx))
        .route("/images-to-docx", post(images_to_docx))
        .route("/build-docx", post(build_docx))
        .route("/build_docx", post(build_docx))
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024)) // 50MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Run server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(serde::Serialize)]
struct OcrResponse {
    text: String,
}

/// OCR an uploaded image to plain text.
async fn ocr_endpoint(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OcrResponse>, ApiError> {
    let body = read_upload_body(multipart, &["image"]).await?;
    let upload = body.single()?;

    let scratch = ScratchFile::write(
        &state.config.upload_dir,
        upload.filename.as_deref(),
        &upload.data,
    )?;
    let text = state.recognizer.recognize_text(&scratch, &body.lang).await?;

    Ok(Json(OcrResponse { text }))
}

/// OCR a single image and return a formatted DOCX.
async fn image_to_docx(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let body = read_upload_body(multipart, &["image"]).await?;
    let upload = body.single()?;

    let scratch = ScratchFile::write(
        &state.config.upload_dir,
        upload.filename.as_deref(),
        &upload.data,
    )?;
    let page = recognize_page(&state, &scratch, &body.lang).await?;

    let bytes = docx::build_from_pages(&[page], &state.config.layout)?;
    Ok(docx_response(bytes))
}

/// OCR several images into one combined DOCX, one page per image.
async fn images_to_docx(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let body = read_upload_body(multipart, &["images", "image"]).await?;
    if body.uploads.is_empty() {
        return Err(ApiError::BadRequest("no image files uploaded".to_string()));
    }

    let mut pages: Vec<ClassifiedPage> = Vec::with_capacity(body.uploads.len());
    // Guards stay alive until the document is built; each drop removes a file
    let mut scratches: Vec<ScratchFile> = Vec::with_capacity(body.uploads.len());
    for upload in &body.uploads {
        if upload.data.is_empty() {
            return Err(ApiError::EmptyUpload);
        }
        let scratch = ScratchFile::write(
            &state.config.upload_dir,
            upload.filename.as_deref(),
            &upload.data,
        )?;
        let page = recognize_page(&state, &scratch, &body.lang).await?;
        pages.push(page);
        scratches.push(scratch);
    }

    let bytes = docx::build_from_pages(&pages, &state.config.layout)?;
    Ok(docx_response(bytes))
}

/// Build a DOCX from raw text, no OCR involved.
async fn build_docx(mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut text: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart error: {e}")))?
    {
        if field.name() == Some("text") {
            text = Some(
                field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable text field: {e}")))?,
            );
            break;
        }
    }
    let text = text.ok_or_else(|| ApiError::BadRequest("missing 'text' field".to_string()))?;

    let bytes = docx_text::build_from_text(&text)?;
    Ok(docx_response(bytes))
}

// ============================================================================
// Helper functions
// ============================================================================

struct Upload {
    filename: Option<String>,
    data: Vec<u8>,
}

struct UploadBody {
    uploads: Vec<Upload>,
    lang: String,
}

impl UploadBody {
    /// Exactly-one-file endpoints: first upload, non-empty.
    fn single(&self) -> Result<&Upload, ApiError> {
        let upload = self
            .uploads
            .first()
            .ok_or_else(|| ApiError::BadRequest("missing image file field".to_string()))?;
        if upload.data.is_empty() {
            return Err(ApiError::EmptyUpload);
        }
        Ok(upload)
    }
}

/// Drain a multipart body, collecting file uploads under the accepted field
/// names plus the optional `lang` selector (default `auto`).
async fn read_upload_body(
    mut multipart: Multipart,
    file_fields: &[&str],
) -> Result<UploadBody, ApiError> {
    let mut uploads = Vec::new();
    let mut lang = "auto".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart error: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some(name) if file_fields.contains(&name) => {
                let filename = field.file_name().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file: {e}")))?
                    .to_vec();
                uploads.push(Upload { filename, data });
            }
            Some("lang") => {
                lang = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable lang field: {e}")))?;
            }
            _ => {}
        }
    }

    Ok(UploadBody { uploads, lang })
}

/// Run recognition + layout classification for one scratch image.
async fn recognize_page(
    state: &AppState,
    scratch: &ScratchFile,
    lang: &str,
) -> Result<ClassifiedPage, ApiError> {
    let lines = state.recognizer.recognize_lines(scratch, lang).await?;
    Ok(classify_page(lines, &state.config.layout))
}

/// Binary DOCX response with an attachment filename.
fn docx_response(bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, DOCX_MIME),
            (
                header::CONTENT_DISPOSITION,
                r#"attachment; filename="result.docx""#,
            ),
        ],
        bytes,
    )
        .into_response()
}

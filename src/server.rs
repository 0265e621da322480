use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};

use crate::handlers::prompts::preset_instructions;
use crate::handlers::NutritionWorkflow;
use crate::models::{ImageInput, NutritionRecord};

const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 image, optionally as a `data:image/...;base64,` URL
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub display_text: String,
    pub record: Option<NutritionRecord>,
}

#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    #[serde(default)]
    pub record: Option<NutritionRecord>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub display_text: String,
    pub record: Option<NutritionRecord>,
    pub label_png_base64: Option<String>,
}

pub struct AppState {
    pub workflow: NutritionWorkflow,
}

pub fn create_router(workflow: NutritionWorkflow) -> Router {
    let state = Arc::new(AppState { workflow });

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/api/prompts", get(prompts_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/label", post(label_handler))
        .route("/api/process", post(process_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

pub async fn serve(addr: &str, router: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("🌐 HTTP server listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}

/// Decodes the uploaded photo to pixels. Undecodable input is treated like a
/// missing image.
fn decode_image(encoded: Option<&str>) -> Option<ImageInput> {
    let encoded = encoded?.trim();
    if encoded.is_empty() {
        return None;
    }
    let payload = match encoded.split_once(";base64,") {
        Some((_, data)) => data,
        None => encoded,
    };

    let bytes = match general_purpose::STANDARD.decode(payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("⚠️ Ignoring undecodable image_base64: {}", e);
            return None;
        }
    };

    match image::load_from_memory(&bytes) {
        Ok(pixels) => Some(ImageInput::Pixels(pixels)),
        Err(e) => {
            log::warn!("⚠️ Ignoring image_base64 that is not a readable image: {}", e);
            None
        }
    }
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    log::info!("📨 Analyze request received");

    let image = decode_image(request.image_base64.as_deref());
    let outcome = state
        .workflow
        .analysis()
        .analyze(image, request.instruction.as_deref())
        .await;

    Json(AnalyzeResponse {
        display_text: outcome.display_text,
        record: outcome.record,
    })
}

async fn label_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LabelRequest>,
) -> Response {
    log::info!("📨 Label request received");

    let Some(label) = state.workflow.label().synthesize(request.record.as_ref()).await else {
        return StatusCode::NO_CONTENT.into_response();
    };

    match label.to_png_bytes() {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(e) => {
            log::error!("❌ Failed to encode label as PNG: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn process_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<ProcessResponse> {
    log::info!("📨 Process request received");

    let image = decode_image(request.image_base64.as_deref());
    let result = state
        .workflow
        .run(image, request.instruction.as_deref())
        .await;

    let label_png_base64 = result.label.and_then(|label| match label.to_png_bytes() {
        Ok(bytes) => Some(general_purpose::STANDARD.encode(bytes)),
        Err(e) => {
            log::error!("❌ Failed to encode label as PNG: {}", e);
            None
        }
    });

    Json(ProcessResponse {
        display_text: result.outcome.display_text,
        record: result.outcome.record,
        label_png_base64,
    })
}

async fn prompts_handler() -> Json<Vec<&'static str>> {
    Json(preset_instructions().to_vec())
}

async fn root_handler() -> &'static str {
    "Nutrition Label Server - POST /api/analyze, /api/label or /api/process"
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PROMPT_USER_MESSAGE;
    use crate::services::ai_service::mock::MockModel;
    use crate::services::ResponsePart;
    use axum::body::Body;
    use axum::http::Request;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use std::time::Duration;
    use tower::ServiceExt;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn png_base64_3x2() -> String {
        general_purpose::STANDARD.encode(png_bytes(3, 2))
    }

    fn router(model: Arc<MockModel>) -> Router {
        create_router(NutritionWorkflow::new(model, Duration::from_secs(5)))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_decode_image_variants() {
        let raw = general_purpose::STANDARD.encode(png_bytes(1, 1));
        match decode_image(Some(raw.as_str())) {
            Some(ImageInput::Pixels(pixels)) => assert_eq!((pixels.width(), pixels.height()), (1, 1)),
            other => panic!("expected pixels, got {:?}", other),
        }

        let data_url = format!("data:image/png;base64,{}", png_base64_3x2());
        match decode_image(Some(data_url.as_str())) {
            Some(ImageInput::Pixels(pixels)) => assert_eq!((pixels.width(), pixels.height()), (3, 2)),
            other => panic!("expected pixels, got {:?}", other),
        }

        let not_an_image = general_purpose::STANDARD.encode(b"hello");
        assert!(decode_image(Some(not_an_image.as_str())).is_none());
        assert!(decode_image(Some("***not base64***")).is_none());
        assert!(decode_image(Some("  ")).is_none());
        assert!(decode_image(None).is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(Arc::new(MockModel::replying("")))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_analyze_returns_record() {
        let model = Arc::new(MockModel::replying("```json\n{\"meal_type\": \"lunch\"}\n```"));
        let request = post_json(
            "/api/analyze",
            serde_json::json!({
                "image_base64": general_purpose::STANDARD.encode(png_bytes(2, 2)),
                "instruction": "analyze"
            }),
        );

        let response = router(model).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["record"]["meal_type"], "lunch");
        assert!(body["display_text"].as_str().unwrap().contains("\"meal_type\": \"lunch\""));
    }

    #[tokio::test]
    async fn test_analyze_without_image_prompts_user() {
        let model = Arc::new(MockModel::replying(""));
        let request = post_json("/api/analyze", serde_json::json!({ "instruction": "analyze" }));

        let response = router(model.clone()).oneshot(request).await.unwrap();
        let body = body_json(response).await;

        assert_eq!(body["display_text"], PROMPT_USER_MESSAGE);
        assert!(body["record"].is_null());
        assert_eq!(model.analyze_calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_with_unreadable_image_prompts_user() {
        let model = Arc::new(MockModel::replying("```json\n{\"meal_type\": \"lunch\"}\n```"));
        let request = post_json(
            "/api/analyze",
            serde_json::json!({
                "image_base64": general_purpose::STANDARD.encode(b"not an image"),
                "instruction": "analyze"
            }),
        );

        let response = router(model.clone()).oneshot(request).await.unwrap();
        let body = body_json(response).await;

        assert_eq!(body["display_text"], PROMPT_USER_MESSAGE);
        assert_eq!(model.analyze_calls(), 0);
    }

    #[tokio::test]
    async fn test_label_returns_png() {
        let model = Arc::new(MockModel::replying("").with_label_parts(vec![ResponsePart::Image {
            mime_type: "image/png".to_string(),
            data: png_bytes(4, 4),
        }]));
        let request = post_json("/api/label", serde_json::json!({ "record": { "meal_type": "snack" } }));

        let response = router(model).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_label_without_record_is_no_content() {
        let model = Arc::new(MockModel::replying(""));
        let request = post_json("/api/label", serde_json::json!({}));

        let response = router(model.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(model.label_calls(), 0);
    }

    #[tokio::test]
    async fn test_process_runs_both_stages() {
        let model = Arc::new(
            MockModel::replying("```json\n{\"meal_type\": \"dinner\"}\n```").with_label_parts(vec![
                ResponsePart::Text("label below".to_string()),
                ResponsePart::Image {
                    mime_type: "image/png".to_string(),
                    data: png_bytes(3, 3),
                },
            ]),
        );
        let request = post_json(
            "/api/process",
            serde_json::json!({
                "image_base64": general_purpose::STANDARD.encode(png_bytes(2, 2)),
                "instruction": "analyze"
            }),
        );

        let response = router(model.clone()).oneshot(request).await.unwrap();
        let body = body_json(response).await;

        assert_eq!(body["record"]["meal_type"], "dinner");
        assert!(body["label_png_base64"].is_string());
        assert_eq!(model.analyze_calls(), 1);
        assert_eq!(model.label_calls(), 1);
    }
}

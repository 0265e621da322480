use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};

use super::ai_service::{GenerativeModel, ResponsePart};
use crate::config::{Config, ImageTransport};
use crate::models::ImageFile;

/// Image generation model used for labels. Not configurable.
pub const LABEL_MODEL: &str = "gemini-2.0-flash-exp-image-generation";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Base64 inline payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    #[serde(default)]
    name: String,
    uri: String,
    mime_type: Option<String>,
}

/// Google Gemini REST client
pub struct GeminiService {
    api_key: String,
    base_url: String,
    analysis_model: String,
    transport: ImageTransport,
    client: reqwest::Client,
}

impl GeminiService {
    pub fn new(
        api_key: String,
        base_url: String,
        analysis_model: String,
        transport: ImageTransport,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            api_key,
            base_url,
            analysis_model,
            transport,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.analysis_model.clone(),
            config.image_transport,
        )
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<Content> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        log::info!("🤖 Sending request to Gemini with model: {}", model);
        log::debug!("📤 Request payload size: {} bytes", serde_json::to_string(request)?.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 Gemini response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await?;
            log::error!("❌ Gemini API error response: {}", error_text);
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        let response_text = response.text().await?;
        log::debug!("📄 Raw Gemini response size: {} bytes", response_text.len());

        let parsed: GenerateContentResponse =
            serde_json::from_str(&response_text).context("Malformed Gemini response")?;

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
                anyhow::bail!("Gemini blocked the prompt: {}", reason);
            }
            anyhow::bail!("Gemini returned no candidates");
        };

        match candidate.content {
            Some(content) => Ok(content),
            None => anyhow::bail!(
                "Gemini candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        }
    }

    async fn image_part(&self, image: &ImageFile) -> Result<Part> {
        match self.transport {
            ImageTransport::Inline => {
                let bytes = tokio::fs::read(&image.path)
                    .await
                    .with_context(|| format!("Failed to read {}", image.path.display()))?;
                log::debug!("📊 Image file size: {} bytes", bytes.len());

                Ok(Part {
                    inline_data: Some(Blob {
                        mime_type: image.mime_type.clone(),
                        data: general_purpose::STANDARD.encode(&bytes),
                    }),
                    ..Default::default()
                })
            }
            ImageTransport::Upload => {
                let uploaded = self.upload_file(image).await?;
                Ok(Part {
                    file_data: Some(FileData {
                        mime_type: uploaded.mime_type.unwrap_or_else(|| image.mime_type.clone()),
                        file_uri: uploaded.uri,
                    }),
                    ..Default::default()
                })
            }
        }
    }

    /// Resumable upload through the File API: `start`, then one
    /// `upload, finalize` with the whole body.
    async fn upload_file(&self, image: &ImageFile) -> Result<UploadedFile> {
        let bytes = tokio::fs::read(&image.path)
            .await
            .with_context(|| format!("Failed to read {}", image.path.display()))?;
        let display_name = image
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "food-image".to_string());

        log::info!("📤 Uploading {} ({} bytes) to Gemini File API", display_name, bytes.len());

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", &image.mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;

        if !start.status().is_success() {
            let status = start.status();
            let error_text = start.text().await?;
            anyhow::bail!("Gemini upload start failed ({}): {}", status, error_text);
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Gemini upload start returned no upload URL"))?;

        let response = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            anyhow::bail!("Gemini upload failed ({}): {}", status, error_text);
        }

        let uploaded: UploadResponse = response.json().await?;
        log::info!("✅ Uploaded {} as {}", display_name, uploaded.file.name);
        Ok(uploaded.file)
    }
}

#[async_trait::async_trait]
impl GenerativeModel for GeminiService {
    async fn analyze_image(&self, image: &ImageFile, instruction: &str) -> Result<String> {
        log::debug!("📸 Starting image analysis for: {}", image.path.display());

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![self.image_part(image).await?, Part::text(instruction)],
            }],
            generation_config: None,
        };

        let content = self.generate_content(&self.analysis_model, &request).await?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();

        log::info!("💬 Gemini response content: {}", text);
        Ok(text)
    }

    async fn generate_label(&self, prompt: &str) -> Result<Vec<ResponsePart>> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt)],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            }),
        };

        let content = self.generate_content(LABEL_MODEL, &request).await?;

        // Only the first image is ever used; later ones stay undecoded.
        let mut parts = Vec::with_capacity(content.parts.len());
        let mut has_image = false;
        for part in content.parts {
            if let Some(blob) = part.inline_data {
                if has_image {
                    log::debug!("🖼️ Ignoring extra {} image part", blob.mime_type);
                    continue;
                }
                has_image = true;
                let data = general_purpose::STANDARD
                    .decode(blob.data.as_bytes())
                    .context("Gemini returned invalid base64 image data")?;
                parts.push(ResponsePart::Image {
                    mime_type: blob.mime_type,
                    data,
                });
            } else if let Some(text) = part.text {
                parts.push(ResponsePart::Text(text));
            }
        }

        Ok(parts)
    }
}

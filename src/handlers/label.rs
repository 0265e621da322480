use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;
use crate::handlers::prompts::label_prompt;
use crate::models::{LabelImage, NutritionRecord};
use crate::services::{GenerativeModel, ResponsePart};

/// Nutrition record in, rendered label out.
pub struct LabelPipeline {
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
}

impl LabelPipeline {
    pub fn new(model: Arc<dyn GenerativeModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// `None` when there is no record, the model fails, or it sends back no
    /// image.
    pub async fn synthesize(&self, record: Option<&NutritionRecord>) -> Option<LabelImage> {
        let record = match record {
            Some(record) if !record.is_empty() => record,
            _ => {
                log::info!("ℹ️ No nutrition facts data provided, skipping label");
                return None;
            }
        };

        match self.try_synthesize(record).await {
            Ok(Some(label)) => {
                log::info!("✅ Label generated ({}x{})", label.width(), label.height());
                Some(label)
            }
            Ok(None) => {
                log::warn!("⚠️ Label model returned no image");
                None
            }
            Err(e) => {
                log::error!("❌ Label generation failed: {}", e);
                None
            }
        }
    }

    async fn try_synthesize(
        &self,
        record: &NutritionRecord,
    ) -> Result<Option<LabelImage>, PipelineError> {
        let prompt = label_prompt(record);
        log::debug!("🏷️ Label prompt size: {} bytes", prompt.len());

        let parts = tokio::time::timeout(self.timeout, self.model.generate_label(&prompt))
            .await
            .map_err(|_| PipelineError::Timeout(self.timeout))??;

        first_image(parts)
    }
}

/// Decodes the first inline image. Text before it is logged; everything after
/// it is ignored.
fn first_image(parts: Vec<ResponsePart>) -> Result<Option<LabelImage>, PipelineError> {
    for part in parts {
        match part {
            ResponsePart::Text(text) => log::info!("💬 Label model says: {}", text),
            ResponsePart::Image { mime_type, data } => {
                log::debug!("🖼️ Decoding {} label ({} bytes)", mime_type, data.len());
                let image = image::load_from_memory(&data).map_err(PipelineError::ImageDecode)?;
                return Ok(Some(LabelImage { image }));
            }
        }
    }
    Ok(None)
}

use std::sync::Arc;
use std::time::Duration;

use image::ImageFormat;
use tempfile::NamedTempFile;

use crate::error::PipelineError;
use crate::models::{AnalysisOutcome, ImageFile, ImageInput, NutritionRecord};
use crate::services::{extract_json_blocks, GenerativeModel};

/// Image plus instruction in, nutrition record out.
pub struct AnalysisPipeline {
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
}

/// An image file ready for the model. Holding `_temp` keeps a materialized
/// file alive; dropping it deletes the file.
struct PreparedImage {
    file: ImageFile,
    _temp: Option<NamedTempFile>,
}

impl AnalysisPipeline {
    pub fn new(model: Arc<dyn GenerativeModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Never fails: errors come back as a message with no record.
    pub async fn analyze(
        &self,
        image: Option<ImageInput>,
        instruction: Option<&str>,
    ) -> AnalysisOutcome {
        match self.try_analyze(image, instruction).await {
            Ok(record) => {
                log::info!(
                    "✅ Nutrition facts extracted ({} ingredients, meal type: {})",
                    record.ingredients().len(),
                    record.meal_type().unwrap_or("unknown")
                );
                AnalysisOutcome::success(record)
            }
            Err(PipelineError::MissingInput) => {
                log::info!("ℹ️ Analysis requested without image or instruction");
                AnalysisOutcome::failure(PipelineError::MissingInput.user_message())
            }
            Err(e) => {
                log::error!("❌ Analysis failed: {}", e);
                AnalysisOutcome::failure(e.user_message())
            }
        }
    }

    async fn try_analyze(
        &self,
        image: Option<ImageInput>,
        instruction: Option<&str>,
    ) -> Result<NutritionRecord, PipelineError> {
        let instruction = instruction.filter(|text| !text.trim().is_empty());
        let (image, instruction) = match (image, instruction) {
            (Some(image), Some(instruction)) => (image, instruction),
            _ => return Err(PipelineError::MissingInput),
        };

        let prepared = prepare_image(image).await?;
        log::info!(
            "📸 Analyzing {} ({})",
            prepared.file.path.display(),
            prepared.file.mime_type
        );

        let reply = tokio::time::timeout(
            self.timeout,
            self.model.analyze_image(&prepared.file, instruction),
        )
        .await;
        drop(prepared);

        let text = reply.map_err(|_| PipelineError::Timeout(self.timeout))??;
        first_record(&text)
    }
}

async fn prepare_image(image: ImageInput) -> Result<PreparedImage, PipelineError> {
    match image {
        ImageInput::Path(path) => {
            tokio::fs::metadata(&path).await?;
            Ok(PreparedImage {
                file: ImageFile::from_path(&path),
                _temp: None,
            })
        }
        ImageInput::Pixels(pixels) => {
            let mut temp = tempfile::Builder::new()
                .prefix("nutrilabel-")
                .suffix(".png")
                .tempfile()?;
            pixels
                .write_to(temp.as_file_mut(), ImageFormat::Png)
                .map_err(PipelineError::ImageEncode)?;
            log::debug!("🖼️ Materialized {}x{} pixels to {}", pixels.width(), pixels.height(), temp.path().display());

            Ok(PreparedImage {
                file: ImageFile::new(temp.path(), ImageFormat::Png.to_mime_type()),
                _temp: Some(temp),
            })
        }
        ImageInput::Bytes(bytes) => {
            let format = image::guess_format(&bytes).map_err(PipelineError::ImageEncode)?;
            let extension = format.extensions_str().first().copied().unwrap_or("img");
            let mut temp = tempfile::Builder::new()
                .prefix("nutrilabel-")
                .suffix(&format!(".{}", extension))
                .tempfile()?;
            std::io::Write::write_all(&mut temp, &bytes)?;
            log::debug!("🖼️ Wrote {} bytes to {}", bytes.len(), temp.path().display());

            Ok(PreparedImage {
                file: ImageFile::new(temp.path(), format.to_mime_type()),
                _temp: Some(temp),
            })
        }
    }
}

/// First JSON block wins; any later blocks are dropped.
fn first_record(text: &str) -> Result<NutritionRecord, PipelineError> {
    let mut documents = extract_json_blocks(text).into_iter();
    let first = documents.next().ok_or(PipelineError::NoStructuredResult)?;

    let discarded = documents.count();
    if discarded > 0 {
        log::warn!("⚠️ Ignoring {} additional JSON block(s) in model response", discarded);
    }

    NutritionRecord::from_value(first).ok_or(PipelineError::NoStructuredResult)
}

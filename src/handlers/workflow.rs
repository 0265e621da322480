use std::sync::Arc;
use std::time::Duration;

use crate::handlers::{AnalysisPipeline, LabelPipeline};
use crate::models::{AnalysisOutcome, ImageInput, LabelImage};
use crate::services::GenerativeModel;

/// Both pipelines sharing one model client, run strictly one after the other.
pub struct NutritionWorkflow {
    analysis: AnalysisPipeline,
    label: LabelPipeline,
}

#[derive(Debug)]
pub struct WorkflowResult {
    pub outcome: AnalysisOutcome,
    pub label: Option<LabelImage>,
}

impl NutritionWorkflow {
    pub fn new(model: Arc<dyn GenerativeModel>, timeout: Duration) -> Self {
        Self {
            analysis: AnalysisPipeline::new(model.clone(), timeout),
            label: LabelPipeline::new(model, timeout),
        }
    }

    pub fn analysis(&self) -> &AnalysisPipeline {
        &self.analysis
    }

    pub fn label(&self) -> &LabelPipeline {
        &self.label
    }

    /// Analysis first; its record (if any) feeds label synthesis.
    pub async fn run(&self, image: Option<ImageInput>, instruction: Option<&str>) -> WorkflowResult {
        let outcome = self.analysis.analyze(image, instruction).await;
        let label = self.label.synthesize(outcome.record.as_ref()).await;
        WorkflowResult { outcome, label }
    }
}

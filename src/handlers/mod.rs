pub mod analysis;
pub mod label;
pub mod prompts;
pub mod workflow;

pub use analysis::AnalysisPipeline;
pub use label::LabelPipeline;
pub use workflow::NutritionWorkflow;

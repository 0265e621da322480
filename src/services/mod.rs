pub mod ai_service;
pub mod extractor;
pub mod gemini; // Google Gemini REST client

pub use ai_service::{GenerativeModel, ResponsePart};
pub use extractor::extract_json_blocks;
pub use gemini::GeminiService;

use anyhow::Result;

use crate::models::ImageFile;

/// One piece of a multimodal model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

/// Trait for generative model backends (Gemini, test doubles, ...)
#[async_trait::async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Sends the image plus instruction to the analysis model and returns its
    /// free-form text answer.
    async fn analyze_image(&self, image: &ImageFile, instruction: &str) -> Result<String>;

    /// Asks the image-generation model for a label. Parts come back in the
    /// order the model produced them.
    async fn generate_label(&self, prompt: &str) -> Result<Vec<ResponsePart>>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// What the mock saw when `analyze_image` was called.
    #[derive(Debug, Clone)]
    pub struct SeenImage {
        pub file: ImageFile,
        pub existed_during_call: bool,
        pub bytes: Vec<u8>,
    }

    /// Scripted model that counts calls.
    pub struct MockModel {
        analysis_reply: std::result::Result<String, String>,
        label_reply: std::result::Result<Vec<ResponsePart>, String>,
        delay: Option<Duration>,
        analyze_calls: AtomicUsize,
        label_calls: AtomicUsize,
        seen_images: Mutex<Vec<SeenImage>>,
        seen_prompts: Mutex<Vec<String>>,
    }

    impl MockModel {
        pub fn replying(text: &str) -> Self {
            Self {
                analysis_reply: Ok(text.to_string()),
                label_reply: Ok(Vec::new()),
                delay: None,
                analyze_calls: AtomicUsize::new(0),
                label_calls: AtomicUsize::new(0),
                seen_images: Mutex::new(Vec::new()),
                seen_prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                analysis_reply: Err(message.to_string()),
                label_reply: Err(message.to_string()),
                ..Self::replying("")
            }
        }

        pub fn with_label_parts(mut self, parts: Vec<ResponsePart>) -> Self {
            self.label_reply = Ok(parts);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn analyze_calls(&self) -> usize {
            self.analyze_calls.load(Ordering::SeqCst)
        }

        pub fn label_calls(&self) -> usize {
            self.label_calls.load(Ordering::SeqCst)
        }

        pub fn seen_images(&self) -> Vec<SeenImage> {
            self.seen_images.lock().unwrap().clone()
        }

        pub fn seen_prompts(&self) -> Vec<String> {
            self.seen_prompts.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl GenerativeModel for MockModel {
        async fn analyze_image(&self, image: &ImageFile, _instruction: &str) -> Result<String> {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_images.lock().unwrap().push(SeenImage {
                file: image.clone(),
                existed_during_call: image.path.exists(),
                bytes: std::fs::read(&image.path).unwrap_or_default(),
            });
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.analysis_reply.clone().map_err(|e| anyhow::anyhow!(e))
        }

        async fn generate_label(&self, prompt: &str) -> Result<Vec<ResponsePart>> {
            self.label_calls.fetch_add(1, Ordering::SeqCst);
            self.seen_prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.label_reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }
}

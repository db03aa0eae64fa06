//! Character backstory generation.
//!
//! The offline template renders a one-paragraph backstory from a typed
//! seed with no network access. `BackstoryGenerator` asks the completion
//! service to expand that paragraph and falls back to it on any failure.

use std::sync::Arc;

use tracing::{debug, warn};

use companion_types::character::BackstorySeed;
use companion_types::llm::{CompletionRequest, Message};

use crate::completion::BoxCompletionService;

const UNKNOWN_NAME: &str = "无名";
const UNKNOWN_OCCUPATION: &str = "普通人";
const UNKNOWN_CITY: &str = "一座安静的城市";
const UNKNOWN_AGE: &str = "二十多";
const UNKNOWN_TRAITS: &str = "温和";
const UNKNOWN_CATCHPHRASE: &str = "嗯";

/// Render the offline backstory template.
///
/// Blank or missing seed fields are replaced with neutral wording so the
/// output is always a complete sentence.
pub fn render_offline_backstory(seed: &BackstorySeed) -> String {
    let name = text_or(&seed.name, UNKNOWN_NAME);
    let occupation = text_or(&seed.occupation, UNKNOWN_OCCUPATION);
    let city = text_or(&seed.city, UNKNOWN_CITY);
    let age = seed
        .age
        .filter(|a| *a > 0)
        .map(|a| a.to_string())
        .unwrap_or_else(|| UNKNOWN_AGE.to_string());
    let tags: Vec<&str> = seed
        .personality_tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    let traits = if tags.is_empty() {
        UNKNOWN_TRAITS.to_string()
    } else {
        tags.join("、")
    };
    let catchphrase = text_or(&seed.catchphrase, UNKNOWN_CATCHPHRASE);

    format!(
        "你是一个名叫{name}的{occupation}，生活在{city}，今年{age}岁。你具有{traits}的性格特质，说话会带有“{catchphrase}”的口头禅。"
    )
}

fn text_or<'a>(field: &'a Option<String>, fallback: &'a str) -> &'a str {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
}

/// Where a generated backstory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackstorySource {
    Model,
    Offline,
}

#[derive(Debug, Clone)]
pub struct Backstory {
    pub text: String,
    pub source: BackstorySource,
}

const BACKSTORY_INSTRUCTIONS: &str = "You write short character backstories for a companion \
chat app. Expand the outline you are given into one warm paragraph of four to six sentences, \
addressed to the character in the second person. Keep every fact from the outline and write \
in the outline's language. Reply with the paragraph only.";

/// Generates backstories with the completion service, offline on failure.
pub struct BackstoryGenerator {
    service: Arc<BoxCompletionService>,
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout_ms: Option<u64>,
}

impl BackstoryGenerator {
    pub fn new(
        service: Arc<BoxCompletionService>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self {
            service,
            model: model.into(),
            max_tokens,
            temperature,
            timeout_ms: None,
        }
    }

    /// Give up on the model after `ms` and use the offline template.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms).filter(|ms| *ms > 0);
        self
    }

    /// Generate a backstory for `seed`.
    ///
    /// Never fails: an unconfigured service, a provider error, or an empty
    /// reply all produce the offline template instead.
    pub async fn generate(&self, seed: &BackstorySeed) -> Backstory {
        let outline = render_offline_backstory(seed);
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(outline.clone())],
            system: Some(BACKSTORY_INSTRUCTIONS.to_string()),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            stream: false,
            timeout_ms: self.timeout_ms,
        };

        match self.service.complete(&request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                debug!(model = %response.model, "Backstory generated by model");
                Backstory {
                    text: response.content.trim().to_string(),
                    source: BackstorySource::Model,
                }
            }
            Ok(_) => {
                warn!("Model returned an empty backstory, using offline template");
                Backstory {
                    text: outline,
                    source: BackstorySource::Offline,
                }
            }
            Err(e) => {
                warn!(error = %e, "Backstory generation failed, using offline template");
                Backstory {
                    text: outline,
                    source: BackstorySource::Offline,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::ScriptedCompletionService;

    fn seed() -> BackstorySeed {
        BackstorySeed {
            name: Some("苏晚晴".to_string()),
            occupation: Some("插画师".to_string()),
            city: Some("杭州".to_string()),
            age: Some(24),
            personality_tags: vec!["温柔体贴".to_string(), "知性".to_string()],
            catchphrase: Some("我在呢。".to_string()),
        }
    }

    #[test]
    fn offline_template_fills_every_field() {
        let text = render_offline_backstory(&seed());
        assert_eq!(
            text,
            "你是一个名叫苏晚晴的插画师，生活在杭州，今年24岁。你具有温柔体贴、知性的性格特质，说话会带有“我在呢。”的口头禅。"
        );
    }

    #[test]
    fn offline_template_uses_neutral_defaults() {
        let text = render_offline_backstory(&BackstorySeed::default());
        assert!(text.contains("名叫无名的普通人"));
        assert!(text.contains("今年二十多岁"));
        assert!(text.contains("“嗯”"));
    }

    #[tokio::test]
    async fn generator_uses_model_reply() {
        let service = ScriptedCompletionService::tokens(&["A quiet ", "illustrator."]);
        let generator =
            BackstoryGenerator::new(Arc::new(BoxCompletionService::new(service)), "m", 256, 0.7);
        let story = generator.generate(&seed()).await;
        assert_eq!(story.source, BackstorySource::Model);
        assert_eq!(story.text, "A quiet illustrator.");
    }

    #[tokio::test]
    async fn generator_falls_back_when_not_configured() {
        let service = ScriptedCompletionService::not_configured();
        let generator =
            BackstoryGenerator::new(Arc::new(BoxCompletionService::new(service)), "m", 256, 0.7);
        let story = generator.generate(&seed()).await;
        assert_eq!(story.source, BackstorySource::Offline);
        assert_eq!(story.text, render_offline_backstory(&seed()));
    }

    #[tokio::test]
    async fn generator_falls_back_on_blank_reply() {
        let service = ScriptedCompletionService::tokens(&["   "]);
        let generator =
            BackstoryGenerator::new(Arc::new(BoxCompletionService::new(service)), "m", 256, 0.7);
        let story = generator.generate(&seed()).await;
        assert_eq!(story.source, BackstorySource::Offline);
    }
}

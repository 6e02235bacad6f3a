use std::sync::Arc;

use tracing::{error, info};

use crate::ports::{CompletionPort, CompletionRequest};

pub const TRANSLATION_PROMPT: &str = "You are a professional translator. \
Translate ONLY the content provided into Uzbek and Russian. CRITICAL RULES:\n\
- NO introductory words like 'Xabar', 'YANGILIK', 'НОВОСТИ', 'Сообщение' etc.\n\
- NO explanatory text or commentary\n\
- Translate EXACTLY what is given, nothing more\n\
- Format response EXACTLY as:\n\n\
🇺🇿 [direct translation only]\n\n\
🇷🇺 [direct translation only]";

#[derive(Clone, Debug)]
pub struct TranslatorConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub attribution_tag: String,
}

/// Bilingual translation with a fixed attribution tag.
///
/// Never fails: when the model call errors the original text is used instead.
pub struct Translator {
    backend: Arc<dyn CompletionPort>,
    cfg: TranslatorConfig,
}

impl Translator {
    pub fn new(backend: Arc<dyn CompletionPort>, cfg: TranslatorConfig) -> Self {
        Self { backend, cfg }
    }

    pub async fn translate(&self, text: Option<&str>) -> String {
        let Some(text) = text else {
            return self.cfg.attribution_tag.clone();
        };

        let req = CompletionRequest {
            model: self.cfg.model.clone(),
            system: TRANSLATION_PROMPT.to_string(),
            user: text.to_string(),
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
        };

        match self.backend.complete(req).await {
            Ok(out) if !out.trim().is_empty() => {
                info!("Successfully translated text");
                self.tagged(out.trim())
            }
            Ok(_) => {
                error!("Translation failed: model returned empty text");
                self.tagged(text)
            }
            Err(e) => {
                error!("Translation failed: {e}");
                self.tagged(text)
            }
        }
    }

    fn tagged(&self, body: &str) -> String {
        format!("{body}\n\n{}", self.cfg.attribution_tag)
    }
}

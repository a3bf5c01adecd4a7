//! services/api/src/adapters/analysis_llm.rs
//!
//! This module contains the adapter for the document analysis LLM.
//! It implements the `AnalysisService` port from the `core` crate against any
//! OpenAI-compatible chat completion endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use document_insights_core::{
    analysis::Analysis,
    ports::{AnalysisService, PortError, PortResult},
};
use std::path::Path;
use tracing::{debug, warn};

/// Placeholder in the user prompt that is replaced with the document text.
pub const TEXT_PLACEHOLDER: &str = "{{EXTRACTED_TEXT}}";

//=========================================================================================
// Prompt Templates
//=========================================================================================

/// The system message and user prompt template sent with every analysis.
#[derive(Clone, Debug)]
pub struct PromptTemplates {
    pub system_message: String,
    pub user_prompt: String,
}

impl PromptTemplates {
    /// Loads `system_message.txt` and `user_prompt.txt` from `dir`.
    pub fn load(dir: &Path) -> std::io::Result<Self> {
        let system_message = std::fs::read_to_string(dir.join("system_message.txt"))?;
        let user_prompt = std::fs::read_to_string(dir.join("user_prompt.txt"))?;
        if !user_prompt.contains(TEXT_PLACEHOLDER) {
            warn!(
                "user_prompt.txt has no {} placeholder; document text will not be sent",
                TEXT_PLACEHOLDER
            );
        }
        Ok(Self {
            system_message,
            user_prompt,
        })
    }

    /// Fills the user template with at most `max_chars` characters of `text`.
    pub fn render_user_prompt(&self, text: &str, max_chars: usize) -> String {
        let text = match text.char_indices().nth(max_chars) {
            Some((cut, _)) => &text[..cut],
            None => text,
        };
        self.user_prompt.replace(TEXT_PLACEHOLDER, text)
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AnalysisService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAnalysisAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    prompts: PromptTemplates,
    max_prompt_chars: usize,
}

impl OpenAiAnalysisAdapter {
    /// Creates a new `OpenAiAnalysisAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        model: String,
        prompts: PromptTemplates,
        max_prompt_chars: usize,
    ) -> Self {
        Self {
            client,
            model,
            prompts,
            max_prompt_chars,
        }
    }
}

//=========================================================================================
// `AnalysisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AnalysisService for OpenAiAnalysisAdapter {
    /// Asks the model for a JSON analysis of the document text.
    async fn analyze(&self, text: &str) -> PortResult<Analysis> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.system_message.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(self.prompts.render_user_prompt(text, self.max_prompt_chars))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.3)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(
                    "Analysis LLM response contained no text content.".to_string(),
                )
            })?;
        debug!(chars = content.len(), "Received analysis from LLM");

        Analysis::from_provider_output(&content)
            .map_err(|e| PortError::Unexpected(format!("Unusable analysis response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> PromptTemplates {
        PromptTemplates {
            system_message: "Return JSON.".to_string(),
            user_prompt: "Document:\n{{EXTRACTED_TEXT}}\nEnd.".to_string(),
        }
    }

    #[test]
    fn user_prompt_embeds_the_text() {
        let rendered = templates().render_user_prompt("Pay $40 by May 1.", 1000);
        assert_eq!(rendered, "Document:\nPay $40 by May 1.\nEnd.");
    }

    #[test]
    fn user_prompt_truncates_on_a_char_boundary() {
        let rendered = templates().render_user_prompt("héllo wörld", 4);
        assert_eq!(rendered, "Document:\nhéll\nEnd.");
    }

    #[test]
    fn shipped_prompts_load_and_contain_the_placeholder() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("prompts");
        let prompts = PromptTemplates::load(&dir).unwrap();
        assert!(prompts.user_prompt.contains(TEXT_PLACEHOLDER));
        assert!(prompts.system_message.contains("risk_level"));
    }
}

//! Gemini format converter
//!
//! Pure translation between OpenAI chat-completion shapes and Gemini's
//! `generateContent` / `models.list` shapes. No I/O happens here.

use crate::{
    current_unix_timestamp, generate_completion_id, ChatChoice, ChatCompletionRequest,
    ChatCompletionResponse, ChatMessage, ChatResponseMessage, ModelInfo, ProviderId, Usage,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Gemini Request Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl GeminiPart {
    pub fn text(s: String) -> Self {
        Self { text: Some(s) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiContent {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiSystemInstruction {
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

// =============================================================================
// Gemini Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: i64,
    #[serde(default)]
    pub candidates_token_count: i64,
    #[serde(default)]
    pub total_token_count: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    pub prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiModel {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiModelList {
    #[serde(default)]
    pub models: Vec<GeminiModel>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

// =============================================================================
// Conversion Functions
// =============================================================================

/// Split OpenAI messages into Gemini's system instruction and contents
///
/// Every system message contributes one part to the system instruction.
/// All other messages become contents in their original order, with
/// `assistant` mapped to Gemini's `model` role.
pub fn convert_messages(
    messages: &[ChatMessage],
) -> (Option<GeminiSystemInstruction>, Vec<GeminiContent>) {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for msg in messages {
        let part = GeminiPart::text(msg.text_content());
        if msg.is_system() {
            system_parts.push(part);
            continue;
        }

        let role = if msg.role.eq_ignore_ascii_case("assistant") {
            "model"
        } else {
            "user"
        };
        contents.push(GeminiContent {
            role: role.to_string(),
            parts: vec![part],
        });
    }

    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(GeminiSystemInstruction {
            parts: system_parts,
        })
    };

    (system_instruction, contents)
}

/// Build the `generateContent` body for a chat request
pub fn build_request(request: &ChatCompletionRequest) -> GeminiRequest {
    let (system_instruction, contents) = convert_messages(&request.messages);

    let generation_config = if request.temperature.is_some()
        || request.top_p.is_some()
        || request.max_tokens.is_some()
        || request.stop.is_some()
    {
        Some(GeminiGenerationConfig {
            temperature: request.temperature,
            top_p: request.top_p,
            max_output_tokens: request.max_tokens,
            stop_sequences: request.stop.clone().map(|s| s.into_vec()),
        })
    } else {
        None
    };

    GeminiRequest {
        contents,
        system_instruction,
        generation_config,
    }
}

/// Map Gemini's finishReason to the OpenAI value
pub fn map_finish_reason(finish_reason: Option<&str>) -> Option<String> {
    finish_reason.map(|r| {
        match r {
            "MAX_TOKENS" => "length",
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
                "content_filter"
            }
            _ => "stop",
        }
        .to_string()
    })
}

/// Build an OpenAI response from a Gemini reply
///
/// Only `candidates[0].content.parts[0].text` is used; a missing candidate
/// or part yields empty content.
pub fn convert_response(response: GeminiResponse, model: &str) -> ChatCompletionResponse {
    let candidate = response.candidates.into_iter().next();

    let (content, finish_reason) = match candidate {
        Some(candidate) => {
            let text = candidate
                .content
                .and_then(|c| c.parts.into_iter().next())
                .and_then(|p| p.text)
                .unwrap_or_default();
            (
                text,
                map_finish_reason(candidate.finish_reason.as_deref())
                    .or_else(|| Some("stop".to_string())),
            )
        }
        None => {
            let blocked = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .is_some();
            let reason = if blocked { "content_filter" } else { "stop" };
            (String::new(), Some(reason.to_string()))
        }
    };

    let usage = response.usage_metadata.map(|u| Usage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
        extra: HashMap::new(),
    });

    ChatCompletionResponse {
        id: generate_completion_id(ProviderId::Gemini),
        object: "chat.completion".to_string(),
        created: current_unix_timestamp(),
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatResponseMessage {
                role: "assistant".to_string(),
                content: Some(content),
                extra: HashMap::new(),
            },
            finish_reason,
            extra: HashMap::new(),
        }],
        usage,
        extra: HashMap::new(),
    }
}

/// Keep models that can serve `generateContent` and strip the `models/`
/// resource prefix from their names
///
/// Models that do not advertise their methods are kept.
pub fn convert_models(models: Vec<GeminiModel>) -> Vec<ModelInfo> {
    models
        .into_iter()
        .filter(|m| {
            m.supported_generation_methods.is_empty()
                || m
                    .supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
        })
        .map(|m| ModelInfo {
            id: m
                .name
                .strip_prefix("models/")
                .unwrap_or(&m.name)
                .to_string(),
            object: "model".to_string(),
            created: 0,
            owned_by: "google".to_string(),
        })
        .collect()
}

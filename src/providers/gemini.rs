//! Google Gemini 适配器

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::ProviderError;
use crate::models::request::{ProviderKind, ReasoningEffort, RunRequest};
use crate::models::response::ProviderResponse;
use crate::providers::{matches_any_prefix, send_classified, ProviderAdapter};

/// 接受的模型前缀
const GEMINI_MODEL_PREFIXES: &[&str] = &["gemini-2.5", "gemini-3"];

/// Gemini 适配器
pub struct GeminiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiAdapter {
    /// 创建新的 Gemini 适配器
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.clone(),
        }
    }
}

/// 推理力度到 thinking 预算的映射
fn thinking_budget(effort: ReasoningEffort) -> u32 {
    match effort {
        ReasoningEffort::Low => 1024,
        ReasoningEffort::Medium => 8192,
        ReasoningEffort::High => 24576,
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleGemini
    }

    fn validate_model(&self, model: &str) -> bool {
        matches_any_prefix(model, GEMINI_MODEL_PREFIXES)
    }

    fn build_payload(&self, request: &RunRequest) -> Value {
        // google_search 工具与 thinkingConfig 永远附加
        json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": request.prompt()}],
            }],
            "tools": [{"google_search": {}}],
            "generationConfig": {
                "maxOutputTokens": request.max_completion_tokens,
                "thinkingConfig": {
                    "includeThoughts": true,
                    "thinkingBudget": thinking_budget(request.reasoning_effort),
                },
            },
        })
    }

    async fn dispatch(
        &self,
        request: &RunRequest,
        payload: Value,
    ) -> Result<ProviderResponse, ProviderError> {
        let endpoint = format!(
            "{}/models/{}:generateContent",
            self.base_url, request.model
        );
        debug!("调用 Gemini API: {}", endpoint);

        let builder = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload);

        send_classified(builder, &endpoint).await
    }

    fn extract_signals(&self, raw: &Value) -> (Vec<String>, String) {
        let mut evidence = Vec::new();
        let mut reasoning_parts: Vec<String> = Vec::new();

        let candidate = match raw
            .get("candidates")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
        {
            Some(c) => c,
            None => return (evidence, String::new()),
        };

        if let Some(metadata) = candidate.get("groundingMetadata") {
            if let Some(chunks) = metadata.get("groundingChunks").and_then(|v| v.as_array()) {
                for chunk in chunks {
                    if let Some(uri) = chunk
                        .get("web")
                        .and_then(|w| w.get("uri"))
                        .and_then(|v| v.as_str())
                    {
                        evidence.push(uri.to_string());
                    }
                }
            }
            if let Some(queries) = metadata.get("webSearchQueries").and_then(|v| v.as_array()) {
                for q in queries {
                    if let Some(q) = q.as_str() {
                        evidence.push(format!("web_search_query:{}", q));
                    }
                }
            }
        }

        // thought=true 的 part 是思考过程，其余是正文
        for part in candidate_parts(candidate) {
            if part.get("thought").and_then(|v| v.as_bool()) == Some(true) {
                if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                    reasoning_parts.push(text.to_string());
                }
            }
        }

        (evidence, reasoning_parts.join("\n"))
    }

    fn extract_answer(&self, raw: &Value) -> String {
        let mut texts: Vec<String> = Vec::new();
        if let Some(candidate) = raw
            .get("candidates")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
        {
            for part in candidate_parts(candidate) {
                if part.get("thought").and_then(|v| v.as_bool()) != Some(true) {
                    if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                        texts.push(text.to_string());
                    }
                }
            }
        }
        texts.join("\n")
    }
}

/// candidate 的 content.parts 数组
fn candidate_parts(candidate: &Value) -> impl Iterator<Item = &Value> {
    const EMPTY: &[Value] = &[];
    candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|v| v.as_array())
        .map_or(EMPTY, |a| a.as_slice())
        .iter()
}

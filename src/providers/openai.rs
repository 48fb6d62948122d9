//! OpenAI 适配器（Responses / Deep Research 两个变体）
//!
//! 两个变体共用 Responses 端点，差异只在模型白名单与搜索工具类型，
//! 所以用一个结构体加变体字段实现，不拆成两份近乎相同的代码。

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::ProviderError;
use crate::models::request::{ProviderKind, RunRequest};
use crate::models::response::ProviderResponse;
use crate::providers::{matches_any_prefix, send_classified, ProviderAdapter};

/// Responses 变体接受的模型前缀
const RESPONSES_MODEL_PREFIXES: &[&str] = &["gpt-5", "o3", "o4"];

/// Deep Research 变体接受的模型前缀
const DEEP_RESEARCH_MODEL_PREFIXES: &[&str] = &["o3-deep-research", "o4-mini-deep-research"];

/// OpenAI 适配器变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiVariant {
    /// 普通 Responses API
    Responses,
    /// Deep Research 模型族
    DeepResearch,
}

/// OpenAI 适配器
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    variant: OpenAiVariant,
}

impl OpenAiAdapter {
    /// 创建新的 OpenAI 适配器
    pub fn new(client: reqwest::Client, config: &Config, variant: OpenAiVariant) -> Self {
        Self {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.clone(),
            variant,
        }
    }

    /// 变体对应的搜索工具类型
    fn web_search_tool_type(&self) -> &'static str {
        match self.variant {
            OpenAiVariant::Responses => "web_search",
            OpenAiVariant::DeepResearch => "web_search_preview",
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        match self.variant {
            OpenAiVariant::Responses => ProviderKind::OpenAiResponses,
            OpenAiVariant::DeepResearch => ProviderKind::OpenAiDeepResearch,
        }
    }

    fn validate_model(&self, model: &str) -> bool {
        let prefixes = match self.variant {
            OpenAiVariant::Responses => RESPONSES_MODEL_PREFIXES,
            OpenAiVariant::DeepResearch => DEEP_RESEARCH_MODEL_PREFIXES,
        };
        matches_any_prefix(model, prefixes)
    }

    fn build_payload(&self, request: &RunRequest) -> Value {
        // 搜索工具与推理力度永远附加
        let mut payload = json!({
            "model": request.model,
            "input": [{"role": "user", "content": request.prompt()}],
            "tools": [{"type": self.web_search_tool_type()}],
            "tool_choice": "auto",
            "reasoning": {
                "effort": request.reasoning_effort.as_str(),
                "summary": "auto",
            },
            "max_output_tokens": request.max_completion_tokens,
        });
        if !request.include_fields.is_empty() {
            payload["include"] = json!(request.include_fields);
        }
        payload
    }

    async fn dispatch(
        &self,
        request: &RunRequest,
        payload: Value,
    ) -> Result<ProviderResponse, ProviderError> {
        let endpoint = format!("{}/responses", self.base_url);
        debug!("调用 OpenAI API: {} (模型: {})", endpoint, request.model);

        let builder = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload);

        send_classified(builder, &endpoint).await
    }

    fn extract_signals(&self, raw: &Value) -> (Vec<String>, String) {
        let mut evidence = Vec::new();
        let mut reasoning_parts: Vec<String> = Vec::new();

        let output = match raw.get("output").and_then(|v| v.as_array()) {
            Some(items) => items,
            None => return (evidence, String::new()),
        };

        for item in output {
            match item.get("type").and_then(|v| v.as_str()) {
                // 搜索工具调用本身就是检索证据
                Some("web_search_call") => {
                    let id = item.get("id").and_then(|v| v.as_str()).unwrap_or("unknown");
                    evidence.push(format!("web_search_call:{}", id));
                }
                Some("reasoning") => {
                    if let Some(summary) = item.get("summary").and_then(|v| v.as_array()) {
                        for part in summary {
                            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                                reasoning_parts.push(text.to_string());
                            }
                        }
                    }
                }
                Some("message") => {
                    for part in content_parts(item) {
                        if let Some(annotations) =
                            part.get("annotations").and_then(|v| v.as_array())
                        {
                            for ann in annotations {
                                if ann.get("type").and_then(|v| v.as_str())
                                    == Some("url_citation")
                                {
                                    if let Some(url) = ann.get("url").and_then(|v| v.as_str()) {
                                        evidence.push(url.to_string());
                                    }
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        (evidence, reasoning_parts.join("\n"))
    }

    fn extract_answer(&self, raw: &Value) -> String {
        let mut texts: Vec<String> = Vec::new();
        if let Some(output) = raw.get("output").and_then(|v| v.as_array()) {
            for item in output {
                if item.get("type").and_then(|v| v.as_str()) == Some("message") {
                    for part in content_parts(item) {
                        if part.get("type").and_then(|v| v.as_str()) == Some("output_text") {
                            if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                                texts.push(text.to_string());
                            }
                        }
                    }
                }
            }
        }
        texts.join("\n")
    }
}

/// message 条目的 content 数组
fn content_parts(item: &Value) -> impl Iterator<Item = &Value> {
    const EMPTY: &[Value] = &[];
    item.get("content")
        .and_then(|v| v.as_array())
        .map_or(EMPTY, |a| a.as_slice())
        .iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::{ReasoningEffort, RunRequest};

    fn adapter(variant: OpenAiVariant) -> OpenAiAdapter {
        OpenAiAdapter::new(reqwest::Client::new(), &Config::default(), variant)
    }

    fn request(model: &str) -> RunRequest {
        RunRequest::new(
            "甲",
            "乙",
            None,
            ProviderKind::OpenAiResponses,
            model,
            ReasoningEffort::High,
            4096,
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_model_whitelist_prefix_tolerance() {
        let a = adapter(OpenAiVariant::Responses);
        assert!(a.validate_model("gpt-5-mini"));
        assert!(a.validate_model("gpt-5.1-preview"));
        assert!(a.validate_model("o3-pro"));
        assert!(!a.validate_model("gpt-6-foo"));
        assert!(!a.validate_model("gemini-2.5-pro"));
    }

    #[test]
    fn test_deep_research_whitelist() {
        let a = adapter(OpenAiVariant::DeepResearch);
        assert!(a.validate_model("o3-deep-research"));
        assert!(a.validate_model("o4-mini-deep-research-2025"));
        assert!(!a.validate_model("gpt-5-mini"));
    }

    #[test]
    fn test_payload_always_carries_tool_and_reasoning() {
        let a = adapter(OpenAiVariant::Responses);
        let payload = a.build_payload(&request("gpt-5-mini"));
        assert_eq!(payload["tools"][0]["type"], "web_search");
        assert_eq!(payload["reasoning"]["effort"], "high");
        assert_eq!(payload["max_output_tokens"], 4096);

        let a = adapter(OpenAiVariant::DeepResearch);
        let payload = a.build_payload(&request("o3-deep-research"));
        assert_eq!(payload["tools"][0]["type"], "web_search_preview");
    }

    #[test]
    fn test_extract_signals_from_canned_response() {
        let a = adapter(OpenAiVariant::Responses);
        let raw = serde_json::json!({
            "output": [
                {"type": "web_search_call", "id": "ws_123", "status": "completed"},
                {"type": "reasoning", "summary": [
                    {"type": "summary_text", "text": "先检索两份文档的主题。"},
                    {"type": "summary_text", "text": "再对比检索结果。"}
                ]},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "结论如下。",
                     "annotations": [
                        {"type": "url_citation", "url": "https://example.com/a"},
                        {"type": "file_citation", "file_id": "f1"}
                     ]}
                ]}
            ]
        });

        let (evidence, reasoning) = a.extract_signals(&raw);
        assert_eq!(
            evidence,
            vec!["web_search_call:ws_123", "https://example.com/a"]
        );
        assert!(reasoning.contains("先检索"));
        assert!(reasoning.contains("再对比"));
        assert_eq!(a.extract_answer(&raw), "结论如下。");
    }

    #[test]
    fn test_extract_signals_empty_output() {
        let a = adapter(OpenAiVariant::Responses);
        let (evidence, reasoning) = a.extract_signals(&serde_json::json!({"id": "resp_1"}));
        assert!(evidence.is_empty());
        assert!(reasoning.is_empty());
    }
}

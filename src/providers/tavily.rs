//! Tavily Research 适配器
//!
//! Tavily 的研究端点本身就把来源列表和推理文本放在响应顶层，
//! 所以这里覆盖 `execute_and_verify` 走融合路径：先做一次快速检查
//! 用于日志，最终结论仍然出自统一的校验器（与通用路径逐位一致）。

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ProviderError;
use crate::models::outcome::ValidationOutcome;
use crate::models::request::{ProviderKind, RunRequest};
use crate::models::response::ProviderResponse;
use crate::providers::{send_classified, ProviderAdapter};
use crate::services::enforcer;

/// Tavily 适配器
pub struct TavilyAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilyAdapter {
    /// 创建新的 Tavily 适配器
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.tavily_api_key.clone(),
            base_url: config.tavily_base_url.clone(),
        }
    }

    /// 融合式判定：顶层来源与推理齐备时记一次快速命中，
    /// 返回的结论永远来自统一校验器，与通用路径逐位一致
    fn fused_outcome(response: &ProviderResponse) -> ValidationOutcome {
        let quick_pass = !response.grounding_evidence.is_empty()
            && !response.reasoning_text.trim().is_empty();
        if quick_pass {
            info!(
                "⚡ Tavily 快速校验命中: {} 条来源",
                response.grounding_evidence.len()
            );
        }
        enforcer::verify(response)
    }
}

/// 把 `tavily/tvly-*` 形式的模型名归一化为 {mini, pro, auto}
///
/// 接受 `tavily/tvly-pro`、`tvly-mini-latest`、`auto` 等写法；
/// 归一化失败即白名单拒绝。
pub fn normalize_model(model: &str) -> Option<&'static str> {
    let m = model.strip_prefix("tavily/").unwrap_or(model);
    let m = m.strip_prefix("tvly-").unwrap_or(m);

    for tier in ["mini", "pro", "auto"] {
        if m == tier || m.starts_with(&format!("{}-", tier)) {
            return Some(tier);
        }
    }
    None
}

#[async_trait]
impl ProviderAdapter for TavilyAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::TavilyResearch
    }

    fn validate_model(&self, model: &str) -> bool {
        normalize_model(model).is_some()
    }

    fn build_payload(&self, request: &RunRequest) -> Value {
        // 归一化在 validate_model 之后执行，此处必然成功；仍然兜底到 auto
        let model = normalize_model(&request.model).unwrap_or("auto");
        json!({
            "input": request.prompt(),
            "model": model,
            "effort": request.reasoning_effort.as_str(),
            "max_output_tokens": request.max_completion_tokens,
            "include_sources": true,
            "include_reasoning": true,
        })
    }

    async fn dispatch(
        &self,
        request: &RunRequest,
        payload: Value,
    ) -> Result<ProviderResponse, ProviderError> {
        let endpoint = format!("{}/research", self.base_url);
        debug!("调用 Tavily API: {} (模型: {})", endpoint, request.model);

        let builder = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload);

        send_classified(builder, &endpoint).await
    }

    fn extract_signals(&self, raw: &Value) -> (Vec<String>, String) {
        let mut evidence = Vec::new();

        if let Some(sources) = raw.get("sources").and_then(|v| v.as_array()) {
            for source in sources {
                if let Some(url) = source.get("url").and_then(|v| v.as_str()) {
                    evidence.push(url.to_string());
                }
            }
        }

        // 来源列表为空时退而从正文里抓 URL
        if evidence.is_empty() {
            if let Some(output) = raw.get("output").and_then(|v| v.as_str()) {
                if let Ok(re) = Regex::new(r#"https?://[^\s"')\]]+"#) {
                    for m in re.find_iter(output) {
                        evidence.push(m.as_str().to_string());
                    }
                }
            }
        }

        let reasoning = raw
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        (evidence, reasoning)
    }

    fn extract_answer(&self, raw: &Value) -> String {
        raw.get("output")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    /// 融合路径：快速检查只用于日志观测，判定仍走 [`TavilyAdapter::fused_outcome`]
    async fn execute_and_verify(
        &self,
        request: &RunRequest,
    ) -> Result<(ProviderResponse, ValidationOutcome), ProviderError> {
        let response = self.execute(request).await?;
        let outcome = Self::fused_outcome(&response);
        Ok((response, outcome))
    }
}

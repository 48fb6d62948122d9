//! 提供商适配器层
//!
//! 每个 LLM 提供商一个适配器，能力集固定：
//! {validate_model, build_payload, dispatch, extract_signals}。
//! 新增提供商只需新增一个适配器实现，校验器与重试控制器不动。
//!
//! ## 适配器清单
//! - `OpenAiAdapter`（Responses / Deep Research 两个变体）
//! - `GeminiAdapter`
//! - `TavilyAdapter`（提供融合式 `execute_and_verify`，结论仍出自校验器）

pub mod gemini;
pub mod openai;
pub mod tavily;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::error::ProviderError;
use crate::models::outcome::ValidationOutcome;
use crate::models::request::{ProviderKind, RunRequest};
use crate::models::response::ProviderResponse;
use crate::services::enforcer;

pub use gemini::GeminiAdapter;
pub use openai::{OpenAiAdapter, OpenAiVariant};
pub use tavily::TavilyAdapter;

/// 提供商适配器能力集
///
/// `execute` / `execute_and_verify` 是默认实现拼出的组合操作；
/// 适配器可以覆盖 `execute_and_verify` 走融合路径，但最终结论
/// 必须仍然出自 [`enforcer::verify`]。
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// 适配器对应的提供商
    fn kind(&self) -> ProviderKind;

    /// 模型白名单校验（前缀容忍）
    fn validate_model(&self, model: &str) -> bool;

    /// 构建提供商专有的请求报文
    ///
    /// 联网搜索工具与推理力度参数永远附加，不受任何配置控制。
    fn build_payload(&self, request: &RunRequest) -> Value;

    /// 发起一次非流式 HTTP 调用
    async fn dispatch(
        &self,
        request: &RunRequest,
        payload: Value,
    ) -> Result<ProviderResponse, ProviderError>;

    /// 从原始报文提取 (检索证据, 推理文本)
    fn extract_signals(&self, raw: &Value) -> (Vec<String>, String);

    /// 从原始报文提取面向人类的回答正文
    fn extract_answer(&self, raw: &Value) -> String;

    /// 完整执行一次请求：白名单 → 报文 → 调用 → 信号提取
    ///
    /// 白名单拒绝发生在任何网络调用之前。
    async fn execute(&self, request: &RunRequest) -> Result<ProviderResponse, ProviderError> {
        if !self.validate_model(&request.model) {
            return Err(ProviderError::UnsupportedModel {
                provider: self.kind().name().to_string(),
                model: request.model.clone(),
            });
        }

        let payload = self.build_payload(request);
        let mut response = self.dispatch(request, payload).await?;

        let (grounding, reasoning) = self.extract_signals(&response.raw);
        response.grounding_evidence = grounding;
        response.reasoning_text = reasoning;
        response.answer_text = self.extract_answer(&response.raw);

        Ok(response)
    }

    /// 执行并校验（通用路径：execute → 校验器）
    async fn execute_and_verify(
        &self,
        request: &RunRequest,
    ) -> Result<(ProviderResponse, ValidationOutcome), ProviderError> {
        let response = self.execute(request).await?;
        let outcome = enforcer::verify(&response);
        Ok((response, outcome))
    }
}

/// 适配器工厂：按提供商类型取适配器
///
/// 重试控制器与批处理调度器只依赖本接口，测试时注入伪适配器。
pub trait AdapterFactory: Send + Sync {
    fn adapter_for(&self, kind: ProviderKind) -> Arc<dyn ProviderAdapter>;
}

/// 真实 HTTP 适配器工厂，四个适配器共享同一个 reqwest 客户端
pub struct HttpAdapterFactory {
    openai_responses: Arc<OpenAiAdapter>,
    openai_deep_research: Arc<OpenAiAdapter>,
    gemini: Arc<GeminiAdapter>,
    tavily: Arc<TavilyAdapter>,
}

impl HttpAdapterFactory {
    /// 从配置创建工厂
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::new();
        Self {
            openai_responses: Arc::new(OpenAiAdapter::new(
                client.clone(),
                config,
                OpenAiVariant::Responses,
            )),
            openai_deep_research: Arc::new(OpenAiAdapter::new(
                client.clone(),
                config,
                OpenAiVariant::DeepResearch,
            )),
            gemini: Arc::new(GeminiAdapter::new(client.clone(), config)),
            tavily: Arc::new(TavilyAdapter::new(client, config)),
        }
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn adapter_for(&self, kind: ProviderKind) -> Arc<dyn ProviderAdapter> {
        match kind {
            ProviderKind::OpenAiResponses => self.openai_responses.clone(),
            ProviderKind::OpenAiDeepResearch => self.openai_deep_research.clone(),
            ProviderKind::GoogleGemini => self.gemini.clone(),
            ProviderKind::TavilyResearch => self.tavily.clone(),
        }
    }
}

/// 模型名是否命中任一白名单前缀
pub(crate) fn matches_any_prefix(model: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| model.starts_with(p))
}

/// 发送请求并按重试分类法归类 HTTP 结果
///
/// 429/5xx/传输错误 → 可重试；其他非 2xx → 不可重试；
/// 响应体解析失败 → MalformedResponse。
pub(crate) async fn send_classified(
    builder: reqwest::RequestBuilder,
    endpoint: &str,
) -> Result<ProviderResponse, ProviderError> {
    let started = Instant::now();

    let response = builder
        .send()
        .await
        .map_err(|e| ProviderError::RequestFailed {
            endpoint: endpoint.to_string(),
            source: e,
        })?;

    let status = response.status().as_u16();

    if status == 429 {
        return Err(ProviderError::RateLimited { status });
    }
    if (500..600).contains(&status) {
        return Err(ProviderError::ServerError { status });
    }
    if !(200..300).contains(&status) {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderError::NonRetryable {
            status,
            message: crate::utils::logging::truncate_text(&message, 200),
        });
    }

    let raw: Value = response
        .json()
        .await
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    Ok(ProviderResponse::from_raw(raw, status, started.elapsed()))
}

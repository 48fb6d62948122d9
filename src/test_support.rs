//! 测试用伪适配器
//!
//! 按脚本回放响应序列，不发任何网络请求；记录每次 dispatch 的时间点、
//! 提示词和并发重叠度，供重试/调度测试断言转移表与时序。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::error::ProviderError;
use crate::models::outcome::FailureKind;
use crate::models::request::{ProviderKind, RunRequest};
use crate::models::response::ProviderResponse;
use crate::providers::ProviderAdapter;

/// 伪适配器脚本中的一步
pub(crate) struct FakeStep {
    result: Result<Value, ProviderError>,
    latency: Duration,
}

impl FakeStep {
    /// 检索证据与推理俱全的合格响应
    pub(crate) fn pass() -> Self {
        Self {
            result: Ok(fake_raw(true, true)),
            latency: Duration::ZERO,
        }
    }

    /// 指定失败类型的响应
    pub(crate) fn fail(kind: FailureKind) -> Self {
        let raw = match kind {
            FailureKind::MissingGrounding => fake_raw(false, true),
            FailureKind::MissingReasoning => fake_raw(true, false),
            FailureKind::MissingBoth => fake_raw(false, false),
            // 非 JSON 对象触发 UnknownFailure
            FailureKind::UnknownFailure => json!("broken"),
        };
        Self {
            result: Ok(raw),
            latency: Duration::ZERO,
        }
    }

    /// 瞬态错误（可重试）
    pub(crate) fn transient(status: u16) -> Self {
        let error = if status == 429 {
            ProviderError::RateLimited { status }
        } else {
            ProviderError::ServerError { status }
        };
        Self {
            result: Err(error),
            latency: Duration::ZERO,
        }
    }

    /// 不可重试的 HTTP 错误
    pub(crate) fn non_retryable(status: u16) -> Self {
        Self {
            result: Err(ProviderError::NonRetryable {
                status,
                message: "bad request".to_string(),
            }),
            latency: Duration::ZERO,
        }
    }

    /// 给这一步附加模拟调用耗时
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// 构造编码了信号的原始报文，extract_signals 按此还原
fn fake_raw(grounding: bool, reasoning: bool) -> Value {
    json!({
        "grounding": if grounding { vec!["https://example.com/evidence"] } else { Vec::new() },
        "reasoning": if reasoning { "先检索，再推理。" } else { "" },
        "answer": "回答正文",
    })
}

/// 单次 dispatch 的记录
pub(crate) struct CallRecord {
    pub(crate) at: Instant,
    pub(crate) prompt: String,
}

/// 按脚本回放的伪适配器
pub(crate) struct FakeAdapter {
    steps: Mutex<VecDeque<FakeStep>>,
    calls: Mutex<Vec<CallRecord>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    model_prefixes: &'static [&'static str],
}

impl FakeAdapter {
    pub(crate) fn new(steps: Vec<FakeStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            model_prefixes: &["gpt-5", "o3", "o4"],
        }
    }

    /// 已发生的 dispatch 次数
    pub(crate) fn dispatch_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 每次 dispatch 发送的提示词
    pub(crate) fn dispatched_prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.prompt.clone())
            .collect()
    }

    /// 相邻两次 dispatch 之间的时间间隔（暂停时钟下即退避时长）
    pub(crate) fn dispatch_gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| w[1].at - w[0].at).collect()
    }

    /// 观测到的最大并发 dispatch 数
    pub(crate) fn observed_max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// 把同一个伪适配器用于所有提供商的工厂
pub(crate) struct FakeFactory {
    pub(crate) adapter: std::sync::Arc<FakeAdapter>,
}

impl crate::providers::AdapterFactory for FakeFactory {
    fn adapter_for(&self, _kind: ProviderKind) -> std::sync::Arc<dyn ProviderAdapter> {
        self.adapter.clone()
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiResponses
    }

    fn validate_model(&self, model: &str) -> bool {
        self.model_prefixes.iter().any(|p| model.starts_with(p))
    }

    fn build_payload(&self, request: &RunRequest) -> Value {
        json!({"prompt": request.prompt()})
    }

    async fn dispatch(
        &self,
        request: &RunRequest,
        _payload: Value,
    ) -> Result<ProviderResponse, ProviderError> {
        let (result, latency) = {
            let mut steps = self.steps.lock().unwrap();
            let step = steps.pop_front().expect("伪适配器脚本已耗尽");
            (step.result, step.latency)
        };

        self.calls.lock().unwrap().push(CallRecord {
            at: Instant::now(),
            prompt: request.prompt(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result.map(|raw| ProviderResponse::from_raw(raw, 200, latency))
    }

    fn extract_signals(&self, raw: &Value) -> (Vec<String>, String) {
        let evidence = raw
            .get("grounding")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        let reasoning = raw
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        (evidence, reasoning)
    }

    fn extract_answer(&self, raw: &Value) -> String {
        raw.get("answer")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }
}

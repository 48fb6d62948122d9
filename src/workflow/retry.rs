//! 重试控制器 - 流程层
//!
//! 驱动单个请求的至多三次尝试。状态机：
//!
//! ```text
//! Attempt(n) ──校验通过──────────────▶ Success（终态）
//! Attempt(n) ──校验失败, n<3──退避──▶ Attempt(n+1)，提示词升级
//! Attempt(3) ──校验失败──退避───────▶ ExhaustedFailure（终态，不写产物）
//! Attempt(n) ──不可重试错误─────────▶ ExhaustedFailure（终态，跳过剩余尝试）
//! ```
//!
//! 退避表：1s / 2s / 4s（指数，底数 2，无抖动）。每次校验失败后都退避，
//! 包括第三次——耗尽的运行累计退避约 7 秒。瞬态网络错误计入同一次数
//! 上限并走同一退避表，但不升级提示词；耗尽后直接返回错误。
//!
//! 白名单拒绝和非限流 4xx 重试必然再次失败，立即终态，不浪费配额。

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::ProviderError;
use crate::models::outcome::{FailureKind, ValidationOutcome};
use crate::models::request::RunRequest;
use crate::models::response::ProviderResponse;
use crate::orchestrator::qps::QpsLimiter;
use crate::providers::ProviderAdapter;
use crate::workflow::run_ctx::RunCtx;

/// 每个请求的尝试上限（协议固定，不进配置面）
pub const MAX_ATTEMPTS: usize = 3;

/// 第 n 次尝试失败后的退避时长：1s, 2s, 4s
pub fn backoff(attempt: usize) -> Duration {
    debug_assert!((1..=MAX_ATTEMPTS).contains(&attempt));
    Duration::from_secs(1 << (attempt - 1))
}

/// 单个请求的可变重试状态，仅存活于一条流水线内
#[derive(Debug)]
pub struct RetryState {
    /// 当前尝试编号（1 起）
    pub attempt_number: usize,
    /// 上一次的校验结论
    pub last_outcome: Option<ValidationOutcome>,
    /// 已累计的退避时长
    pub backoff_elapsed: Duration,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt_number: 1,
            last_outcome: None,
            backoff_elapsed: Duration::ZERO,
        }
    }

    fn record_failure(&mut self, outcome: Option<ValidationOutcome>, delay: Duration) {
        self.attempt_number += 1;
        if outcome.is_some() {
            self.last_outcome = outcome;
        }
        self.backoff_elapsed += delay;
    }
}

/// 重试循环的终态
#[derive(Debug)]
pub enum RetryOutcome {
    /// 校验通过
    Success {
        response: ProviderResponse,
        attempts: usize,
    },
    /// 重试耗尽，携带最后一次的失败类型
    Exhausted { kind: FailureKind, attempts: usize },
    /// 结构性/不可重试错误，未走完重试即终止
    Fatal { error: ProviderError },
}

/// 重试控制器
///
/// 适配器通过引用注入，测试时换成伪适配器即可在不发真实网络请求的
/// 前提下验证整个转移表。
pub struct RetryController<'a> {
    adapter: &'a dyn ProviderAdapter,
    qps: Option<&'a QpsLimiter>,
}

impl<'a> RetryController<'a> {
    /// 创建新的重试控制器
    pub fn new(adapter: &'a dyn ProviderAdapter, qps: Option<&'a QpsLimiter>) -> Self {
        Self { adapter, qps }
    }

    /// 驱动一个请求直到终态
    pub async fn run(&self, ctx: &RunCtx, request: &RunRequest) -> RetryOutcome {
        // 白名单拒绝在获取任何限速时隙之前返回，不占用速率配额
        if !self.adapter.validate_model(&request.model) {
            let error = ProviderError::UnsupportedModel {
                provider: self.adapter.kind().name().to_string(),
                model: request.model.clone(),
            };
            error!("{} ❌ {}", ctx, error);
            return RetryOutcome::Fatal { error };
        }

        let mut current = request.clone();
        let mut state = RetryState::new();

        loop {
            let attempt = state.attempt_number;

            // 限速只约束新发起的 dispatch，不约束还在退避中的流水线
            if let Some(limiter) = self.qps {
                limiter.acquire().await;
            }

            debug!(
                "{} 第 {}/{} 次尝试 (提供商: {}, 模型: {})",
                ctx, attempt, MAX_ATTEMPTS, current.provider, current.model
            );

            match self.adapter.execute_and_verify(&current).await {
                Ok((response, ValidationOutcome::Pass)) => {
                    info!(
                        "{} ✓ 第 {} 次尝试校验通过: {} 条检索证据, 推理 {} 字符, 耗时 {:?}",
                        ctx,
                        attempt,
                        response.grounding_evidence.len(),
                        response.reasoning_text.chars().count(),
                        response.latency
                    );
                    return RetryOutcome::Success { response, attempts: attempt };
                }

                Ok((_, ValidationOutcome::Fail(kind))) => {
                    let delay = backoff(attempt);
                    warn!(
                        "{} ⚠️ 第 {}/{} 次尝试校验失败: {} (退避 {:?})",
                        ctx,
                        attempt,
                        MAX_ATTEMPTS,
                        kind.describe(),
                        delay
                    );
                    sleep(delay).await;
                    state.record_failure(Some(ValidationOutcome::Fail(kind)), delay);

                    if attempt >= MAX_ATTEMPTS {
                        error!(
                            "{} ❌ 已尝试 {} 次 (累计退避 {:?})，终态失败: {}",
                            ctx, attempt, state.backoff_elapsed, kind.describe()
                        );
                        return RetryOutcome::Exhausted { kind, attempts: attempt };
                    }

                    current = current.escalated(kind);
                    debug!(
                        "{} 提示词已升级，当前指令数: {}",
                        ctx,
                        current.applied_escalations().len()
                    );
                }

                Err(e) if !e.is_retryable() => {
                    error!("{} ❌ 不可重试的错误，跳过剩余尝试: {}", ctx, e);
                    return RetryOutcome::Fatal { error: e };
                }

                Err(e) => {
                    if attempt >= MAX_ATTEMPTS {
                        error!(
                            "{} ❌ 瞬态错误重试耗尽 (上次校验结论: {:?}): {}",
                            ctx, state.last_outcome, e
                        );
                        return RetryOutcome::Fatal { error: e };
                    }
                    let delay = backoff(attempt);
                    warn!(
                        "{} ⚠️ 瞬态错误 (尝试 {}/{}, 上次校验结论: {:?}), 等待 {:?} 后重试: {}",
                        ctx, attempt, MAX_ATTEMPTS, state.last_outcome, delay, e
                    );
                    sleep(delay).await;
                    // 瞬态错误不针对提示词，不升级
                    state.record_failure(None, delay);
                }
            }
        }
    }
}

//! 批处理调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **并发控制**：用 Semaphore 限制同时执行的条目流水线数量
//! 2. **限速**：用 QpsLimiter 独立约束新发起的 dispatch 速率
//! 3. **隔离**：单条目的失败/超时被包含在该条目内，绝不波及兄弟条目
//! 4. **取消**：批级取消信号在信号量排队、退避、网络调用处都可观测
//! 5. **顺序**：输出顺序恒等于输入顺序，与完成顺序无关
//! 6. **统计**：汇总全批的成功/失败/取消数量
//!
//! 条目间唯一共享的可变结构就是信号量和限速器，其余状态全部条目私有。

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::models::batch::BatchJob;
use crate::models::outcome::{ItemResult, ItemStatus};
use crate::models::request::RunRequest;
use crate::orchestrator::qps::QpsLimiter;
use crate::providers::AdapterFactory;
use crate::services::ResultSink;
use crate::workflow::retry::{RetryController, RetryOutcome};
use crate::workflow::run_ctx::RunCtx;

/// 批处理调度器
pub struct BatchScheduler {
    factory: Arc<dyn AdapterFactory>,
    sink: Arc<ResultSink>,
}

impl BatchScheduler {
    /// 创建新的调度器
    pub fn new(factory: Arc<dyn AdapterFactory>, sink: Arc<ResultSink>) -> Self {
        Self { factory, sink }
    }

    /// 运行整批条目直到全部终态
    ///
    /// 返回值按输入顺序排列；部分失败是正常形态，调度器必须等齐
    /// 所有条目再返回。
    pub async fn run_batch(&self, job: BatchJob, cancel: CancellationToken) -> Vec<ItemResult> {
        let total = job.requests.len();
        log_batch_start(total, job.max_concurrency, job.qps);

        let semaphore = Arc::new(Semaphore::new(job.max_concurrency));
        let qps = Arc::new(QpsLimiter::new(job.qps));
        let timeout_per_item = job.timeout_per_item;

        let mut handles = Vec::with_capacity(total);
        for (index, request) in job.requests.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let qps = qps.clone();
            let factory = self.factory.clone();
            let sink = self.sink.clone();
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                // 排队等并发名额时取消信号同样可观测
                let _permit = tokio::select! {
                    _ = cancel.cancelled() => return ItemStatus::Cancelled,
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => return ItemStatus::Cancelled,
                    },
                };

                let ctx = RunCtx::new(index);
                let pipeline = run_item(
                    &ctx,
                    &request,
                    factory.as_ref(),
                    sink.as_ref(),
                    Some(qps.as_ref()),
                );

                tokio::select! {
                    _ = cancel.cancelled() => {
                        warn!("{} ⚠️ 收到取消信号，中止处理", ctx);
                        ItemStatus::Cancelled
                    }
                    result = tokio::time::timeout(timeout_per_item, pipeline) => match result {
                        Ok(status) => status,
                        Err(_) => {
                            // 条目级超时包住整个重试循环，慢提供商拖不垮整批
                            error!("{} ❌ 条目超时 ({:?})", ctx, timeout_per_item);
                            ItemStatus::Failure {
                                kind: None,
                                exit_code: 5,
                                message: format!("条目超时 ({:?})", timeout_per_item),
                            }
                        }
                    }
                }
            });
            handles.push(handle);
        }

        // 条目任务句柄按输入顺序收集，输出顺序与完成时序无关
        let joined = futures::future::join_all(handles).await;
        let mut results = Vec::with_capacity(total);
        for (index, joined_status) in joined.into_iter().enumerate() {
            let status = match joined_status {
                Ok(status) => status,
                Err(e) => {
                    error!("[条目 {}] ❌ 任务执行失败: {}", index, e);
                    ItemStatus::Failure {
                        kind: None,
                        exit_code: 5,
                        message: format!("任务执行失败: {}", e),
                    }
                }
            };
            results.push(ItemResult { index, status });
        }

        let stats = BatchStats::from_results(&results);
        log_batch_complete(&stats);
        results
    }
}

/// 运行单个条目流水线直到终态：重试循环 → 成功则写产物
///
/// 单次运行模式与批处理条目走同一条路径。
pub async fn run_item(
    ctx: &RunCtx,
    request: &RunRequest,
    factory: &dyn AdapterFactory,
    sink: &ResultSink,
    qps: Option<&QpsLimiter>,
) -> ItemStatus {
    let adapter = factory.adapter_for(request.provider);
    let controller = RetryController::new(adapter.as_ref(), qps);

    match controller.run(ctx, request).await {
        RetryOutcome::Success { response, attempts } => {
            info!("{} ✓ 第 {} 次尝试成功，写出产物", ctx, attempts);
            match sink.write_success(ctx, &response).await {
                Ok(artifact_paths) => ItemStatus::Success { artifact_paths },
                Err(e) => {
                    error!("{} ❌ 产物写盘失败: {}", ctx, e);
                    ItemStatus::Failure {
                        kind: None,
                        exit_code: 5,
                        message: format!("产物写盘失败: {}", e),
                    }
                }
            }
        }
        RetryOutcome::Exhausted { kind, attempts } => ItemStatus::Failure {
            kind: Some(kind),
            exit_code: kind.exit_code(),
            message: format!("已尝试 {} 次仍未通过: {}", attempts, kind.describe()),
        },
        RetryOutcome::Fatal { error } => ItemStatus::Failure {
            kind: None,
            exit_code: 5,
            message: error.to_string(),
        },
    }
}

/// 全批处理统计
#[derive(Debug, Default)]
pub struct BatchStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchStats {
    /// 从结果列表汇总
    pub fn from_results(results: &[ItemResult]) -> Self {
        let mut stats = Self {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                ItemStatus::Success { .. } => stats.success += 1,
                ItemStatus::Failure { .. } => stats.failed += 1,
                ItemStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// 是否全部成功
    pub fn all_succeeded(&self) -> bool {
        self.success == self.total
    }
}

// ========== 日志辅助函数 ==========

fn log_batch_start(total: usize, max_concurrency: usize, qps: f64) {
    info!("{}", "=".repeat(60));
    info!("📦 开始批处理: 共 {} 个条目", total);
    info!("📊 最大并发: {} | QPS 上限: {}", max_concurrency, qps);
    info!("{}", "=".repeat(60));
}

fn log_batch_complete(stats: &BatchStats) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 成功: {}/{}", stats.success, stats.total);
    info!("❌ 失败: {}", stats.failed);
    if stats.cancelled > 0 {
        info!("🚫 取消: {}", stats.cancelled);
    }
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::outcome::FailureKind;
    use crate::models::request::{ProviderKind, ReasoningEffort};
    use crate::test_support::{FakeAdapter, FakeFactory, FakeStep};
    use std::time::Duration;

    fn request(model: &str) -> RunRequest {
        RunRequest::new(
            "甲",
            "乙",
            None,
            ProviderKind::OpenAiResponses,
            model,
            ReasoningEffort::Medium,
            2048,
            vec![],
        )
        .unwrap()
    }

    fn job(requests: Vec<RunRequest>, max_concurrency: usize) -> BatchJob {
        BatchJob {
            requests,
            max_concurrency,
            qps: 1000.0,
            timeout_per_item: Duration::from_secs(600),
        }
    }

    fn scheduler(adapter: Arc<FakeAdapter>, tag: &str) -> BatchScheduler {
        let dir = std::env::temp_dir().join(format!("gqr_sched_{}_{}", tag, std::process::id()));
        BatchScheduler::new(
            Arc::new(FakeFactory { adapter }),
            Arc::new(ResultSink::new(dir)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_under_random_latency() {
        // 条目耗时刻意递减，完成顺序与输入顺序相反
        let latencies = [500u64, 400, 300, 200, 100, 50];
        let steps = latencies
            .iter()
            .map(|ms| FakeStep::pass().with_latency(Duration::from_millis(*ms)))
            .collect();
        let adapter = Arc::new(FakeAdapter::new(steps));

        let requests = (0..6).map(|_| request("gpt-5-mini")).collect();
        let results = scheduler(adapter, "order")
            .run_batch(job(requests, 6), CancellationToken::new())
            .await;

        assert_eq!(results.len(), 6);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.index, i);
            assert!(
                matches!(result.status, ItemStatus::Success { .. }),
                "条目 {} 应成功: {:?}",
                i,
                result.status
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_cap() {
        let cap = 2usize;
        let total = 9usize; // ≥ 3 × cap
        let steps = (0..total)
            .map(|_| FakeStep::pass().with_latency(Duration::from_millis(100)))
            .collect();
        let adapter = Arc::new(FakeAdapter::new(steps));

        let requests = (0..total).map(|_| request("gpt-5-mini")).collect();
        let results = scheduler(adapter.clone(), "cap")
            .run_batch(job(requests, cap), CancellationToken::new())
            .await;

        assert_eq!(results.len(), total);
        assert!(
            adapter.observed_max_in_flight() <= cap,
            "并发峰值 {} 超过上限 {}",
            adapter.observed_max_in_flight(),
            cap
        );
        assert_eq!(adapter.dispatch_count(), total);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_model_isolated_from_siblings() {
        // 5 个条目，1 个模型不在白名单：该条目立即退出码 5 且零网络调用，
        // 其余 4 个正常完成，批次返回 5 条结果
        let steps = (0..4).map(|_| FakeStep::pass()).collect();
        let adapter = Arc::new(FakeAdapter::new(steps));

        let mut requests: Vec<RunRequest> = (0..5).map(|_| request("gpt-5-mini")).collect();
        requests[2].model = "gpt-6-foo".to_string();

        let results = scheduler(adapter.clone(), "mixed")
            .run_batch(job(requests, 5), CancellationToken::new())
            .await;

        assert_eq!(results.len(), 5);
        match &results[2].status {
            ItemStatus::Failure { kind, exit_code, .. } => {
                assert_eq!(*kind, None);
                assert_eq!(*exit_code, 5);
            }
            other => panic!("条目 2 应失败: {:?}", other),
        }
        for i in [0usize, 1, 3, 4] {
            assert!(matches!(results[i].status, ItemStatus::Success { .. }));
        }
        assert_eq!(adapter.dispatch_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_item_reports_kind_exit_code() {
        let steps = vec![
            FakeStep::fail(FailureKind::MissingReasoning),
            FakeStep::fail(FailureKind::MissingReasoning),
            FakeStep::fail(FailureKind::MissingReasoning),
        ];
        let adapter = Arc::new(FakeAdapter::new(steps));

        let results = scheduler(adapter, "exhaust")
            .run_batch(job(vec![request("gpt-5-mini")], 1), CancellationToken::new())
            .await;

        match &results[0].status {
            ItemStatus::Failure { kind, exit_code, .. } => {
                assert_eq!(*kind, Some(FailureKind::MissingReasoning));
                assert_eq!(*exit_code, 2);
            }
            other => panic!("期望 Failure: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_marks_items_cancelled() {
        let steps = (0..3)
            .map(|_| FakeStep::pass().with_latency(Duration::from_secs(30)))
            .collect();
        let adapter = Arc::new(FakeAdapter::new(steps));

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let requests = (0..3).map(|_| request("gpt-5-mini")).collect();
        let results = scheduler(adapter, "cancel")
            .run_batch(job(requests, 3), cancel)
            .await;

        assert_eq!(results.len(), 3);
        for result in &results {
            assert_eq!(result.status, ItemStatus::Cancelled);
            assert_eq!(result.status.exit_code(), 5);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_item_timeout_wraps_retry_loop() {
        let adapter = Arc::new(FakeAdapter::new(vec![
            FakeStep::pass().with_latency(Duration::from_secs(30)),
        ]));

        let mut batch = job(vec![request("gpt-5-mini")], 1);
        batch.timeout_per_item = Duration::from_secs(2);
        let results = scheduler(adapter, "timeout")
            .run_batch(batch, CancellationToken::new())
            .await;

        match &results[0].status {
            ItemStatus::Failure { exit_code, message, .. } => {
                assert_eq!(*exit_code, 5);
                assert!(message.contains("超时"));
            }
            other => panic!("期望超时失败: {:?}", other),
        }
    }
}

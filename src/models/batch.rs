//! 批处理作业模型与 TOML 加载器
//!
//! 批处理输入是一个 TOML 文件，`[[items]]` 逐条给出两份文档的路径，
//! 可按条目覆盖提供商/模型。结构性错误（文件缺失、模板非法）在任何
//! 网络调用之前让整个作业失败；模型白名单校验是逐条目的，留给流水线。

use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, FileError};
use crate::models::request::{ProviderKind, ReasoningEffort, RunRequest};

/// TOML 文件中的单个条目
#[derive(Debug, Clone, Deserialize)]
pub struct BatchItemSpec {
    /// 文档 A 路径
    pub file_a: String,
    /// 文档 B 路径
    pub file_b: String,
    /// 按条目覆盖提供商
    pub provider: Option<String>,
    /// 按条目覆盖模型
    pub model: Option<String>,
}

/// TOML 文件整体结构
#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default)]
    items: Vec<BatchItemSpec>,
}

/// 批处理作业：全部子请求及其调度参数
///
/// 作业持有所有子流水线的生命周期，批次运行结束即销毁。
#[derive(Debug)]
pub struct BatchJob {
    /// 按输入顺序排列的请求
    pub requests: Vec<RunRequest>,
    /// 并发流水线上限（计数信号量）
    pub max_concurrency: usize,
    /// 新发起 dispatch 的速率上限（与并发上限相互独立）
    pub qps: f64,
    /// 单条目墙钟超时，包住整个重试循环
    pub timeout_per_item: Duration,
}

impl BatchJob {
    /// 从 TOML 文件加载批处理作业
    ///
    /// 逐条读取两份文档并组合提示词；任何读取/模板错误都让整个作业
    /// 在发出任何请求之前失败（退出码 5）。
    pub async fn load(path: &str, config: &Config) -> Result<Self, AppError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| FileError::ReadFailed {
                    path: path.to_string(),
                    source: e,
                })?;

        let batch_file: BatchFile =
            toml::from_str(&content).map_err(|e| FileError::TomlParseFailed {
                path: path.to_string(),
                source: Box::new(e),
            })?;

        info!("✓ 批处理文件加载完成: {} ({} 个条目)", path, batch_file.items.len());

        let template = config.resolve_prompt_template()?;
        let mut requests = Vec::with_capacity(batch_file.items.len());

        for spec in &batch_file.items {
            let file_a = read_document(&spec.file_a).await?;
            let file_b = read_document(&spec.file_b).await?;

            let provider = match &spec.provider {
                Some(p) => ProviderKind::parse(p)?,
                None => ProviderKind::parse(&config.provider)?,
            };
            let model = spec.model.clone().unwrap_or_else(|| config.model.clone());

            let request = RunRequest::new(
                file_a,
                file_b,
                template.clone(),
                provider,
                model,
                ReasoningEffort::parse_or_default(&config.reasoning_effort),
                config.max_completion_tokens,
                config.include_fields.clone(),
            )?;
            requests.push(request);
        }

        Ok(Self {
            requests,
            max_concurrency: config.max_concurrency.max(1),
            qps: config.qps,
            timeout_per_item: Duration::from_secs(config.timeout_seconds),
        })
    }
}

/// 读取单份输入文档
async fn read_document(path: &str) -> Result<String, AppError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path, e))
}

//! # Grounded Query Runner
//!
//! 一个围绕"接地校验"组织的 LLM 请求编排器：把两份输入文档组合成
//! 一条提示词，发给所选提供商，强制要求响应同时携带联网检索证据与
//! 推理过程，不达标则升级提示词重试，最多三次。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 模型层（Models）
//! - `models/` - 纯数据类型，无 IO
//! - `RunRequest` - 一次生成尝试的不可变描述（提示词升级走派生）
//! - `ProviderResponse` - 归一化的提供商响应
//! - `ItemResult` / `FailureKind` - 终态与退出码协议
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单次响应
//! - `enforcer` - 检索/推理强制校验能力（全系统唯一的合格定义）
//! - `ResultSink` - 成功产物写盘能力（正文 + 侧车文件）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个条目"的完整处理流程
//! - `RunCtx` - 上下文封装（条目序号 + 运行标识）
//! - `RetryController` - 重试状态机（校验失败 → 退避 → 提示词升级）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/scheduler` - 批处理调度器，管理并发、限速与取消
//! - `orchestrator/qps` - QPS 限速器
//!
//! 提供商适配器（`providers/`）横跨能力层之下：每个提供商一个适配器，
//! 能力集固定，新增提供商不动校验器与重试控制器。
//!
//! ## 模块结构

pub mod composer;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod services;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod test_support;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::batch::BatchJob;
pub use models::outcome::{FailureKind, ItemResult, ItemStatus, ValidationOutcome};
pub use models::request::{ProviderKind, ReasoningEffort, RunRequest};
pub use models::response::ProviderResponse;
pub use orchestrator::{run_item, BatchScheduler};
pub use providers::{AdapterFactory, HttpAdapterFactory, ProviderAdapter};
pub use services::ResultSink;
pub use workflow::{RetryController, RetryOutcome, RunCtx};

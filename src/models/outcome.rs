//! 校验结论与批处理条目结果

use serde_json::json;

/// 校验失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 缺少联网检索证据
    MissingGrounding,
    /// 缺少推理过程
    MissingReasoning,
    /// 两者皆缺
    MissingBoth,
    /// 响应无法解析/归类
    UnknownFailure,
}

impl FailureKind {
    /// 单次运行模式的退出码（协议固定，逐位对应）
    pub fn exit_code(self) -> u8 {
        match self {
            FailureKind::MissingGrounding => 1,
            FailureKind::MissingReasoning => 2,
            FailureKind::MissingBoth => 3,
            FailureKind::UnknownFailure => 4,
        }
    }

    /// 一行式失败说明，用于终端摘要
    pub fn describe(self) -> &'static str {
        match self {
            FailureKind::MissingGrounding => "缺少联网检索证据（未发现引用来源）",
            FailureKind::MissingReasoning => "缺少推理过程（未返回有效推理文本）",
            FailureKind::MissingBoth => "检索证据与推理过程均缺失",
            FailureKind::UnknownFailure => "响应无法解析，失败原因未知",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::MissingGrounding => "missing_grounding",
            FailureKind::MissingReasoning => "missing_reasoning",
            FailureKind::MissingBoth => "missing_both",
            FailureKind::UnknownFailure => "unknown_failure",
        };
        write!(f, "{}", name)
    }
}

/// 校验结论
///
/// 只要检索证据或推理文本为空就不可能是 `Pass`——该不变量由校验器
/// 的实现保证，没有任何配置项可以绕过。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// 通过
    Pass,
    /// 失败及其归类
    Fail(FailureKind),
}

/// 批处理条目的终态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// 校验通过，产物已写盘
    Success {
        /// 写出的产物路径（正文 + 侧车文件）
        artifact_paths: Vec<String>,
    },
    /// 终态失败
    Failure {
        /// 校验失败类型；结构性/网络错误没有对应的类型
        kind: Option<FailureKind>,
        /// 退出码（1-5）
        exit_code: u8,
        /// 失败说明
        message: String,
    },
    /// 被批级取消信号中止（不是校验失败）
    Cancelled,
}

impl ItemStatus {
    /// 条目对应的进程退出码
    pub fn exit_code(&self) -> u8 {
        match self {
            ItemStatus::Success { .. } => 0,
            ItemStatus::Failure { exit_code, .. } => *exit_code,
            // 取消在退出码协议中没有专属行，归入"其他错误"
            ItemStatus::Cancelled => 5,
        }
    }
}

/// 批处理单条结果，输出顺序恒等于输入顺序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    /// 输入序号（0 起）
    pub index: usize,
    /// 终态
    pub status: ItemStatus,
}

impl ItemResult {
    /// JSON 输出格式的单条记录
    pub fn to_record(&self) -> serde_json::Value {
        match &self.status {
            ItemStatus::Success { artifact_paths } => json!({
                "index": self.index,
                "status": "success",
                "exit_code": 0,
                "artifact_paths": artifact_paths,
            }),
            ItemStatus::Failure {
                kind,
                exit_code,
                message,
            } => json!({
                "index": self.index,
                "status": "failure",
                "kind": kind.map(|k| k.to_string()),
                "exit_code": exit_code,
                "message": message,
            }),
            ItemStatus::Cancelled => json!({
                "index": self.index,
                "status": "cancelled",
                "exit_code": 5,
            }),
        }
    }

    /// 行式输出格式的单行文本
    pub fn to_line(&self) -> String {
        match &self.status {
            ItemStatus::Success { artifact_paths } => artifact_paths
                .first()
                .cloned()
                .unwrap_or_else(|| "-".to_string()),
            ItemStatus::Failure { exit_code, .. } => format!("FAILED(exit={})", exit_code),
            ItemStatus::Cancelled => "CANCELLED".to_string(),
        }
    }
}

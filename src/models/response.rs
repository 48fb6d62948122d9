//! 提供商响应模型

use std::time::Duration;

use serde_json::Value;

/// 一次 API 调用的归一化结果
///
/// 由产生它的提供商适配器独占构造；校验器只读消费。
/// `raw` 永远保留原始报文，成功时原样写入 raw 侧车文件。
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// 原始响应报文（提供商专有结构，不做任何裁剪）
    pub raw: Value,
    /// 面向人类的回答正文
    pub answer_text: String,
    /// 检索证据（引用 URL / 搜索工具调用标记），可能为空
    pub grounding_evidence: Vec<String>,
    /// 推理过程文本，可能为空
    pub reasoning_text: String,
    /// HTTP 状态码
    pub http_status: u16,
    /// 本次调用耗时
    pub latency: Duration,
}

impl ProviderResponse {
    /// 构造只含原始报文的响应，信号由适配器随后提取
    pub fn from_raw(raw: Value, http_status: u16, latency: Duration) -> Self {
        Self {
            raw,
            answer_text: String::new(),
            grounding_evidence: Vec::new(),
            reasoning_text: String::new(),
            http_status,
            latency,
        }
    }
}

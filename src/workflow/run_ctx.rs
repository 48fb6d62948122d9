//! 运行上下文
//!
//! 封装"我正在处理第几个条目、这次运行的标识是什么"这一信息

use std::fmt::Display;

/// 单条目运行上下文
#[derive(Debug, Clone)]
pub struct RunCtx {
    /// 条目在批次中的序号（0 起，单次运行模式恒为 0）
    pub item_index: usize,
    /// 运行标识，用于产物文件命名
    pub run_id: String,
}

impl RunCtx {
    /// 创建新的运行上下文，run_id 由时间戳和序号生成
    pub fn new(item_index: usize) -> Self {
        let run_id = format!(
            "{}-item{}",
            chrono::Local::now().format("%Y%m%d-%H%M%S"),
            item_index
        );
        Self { item_index, run_id }
    }
}

impl Display for RunCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[条目 {}]", self.item_index)
    }
}

//! 结果落盘服务 - 业务能力层
//!
//! 只负责"成功产物写盘"能力，不关心流程。契约：只有校验通过的
//! 响应才会到达这里——失败不写任何产物。
//!
//! 每次成功写出三份产物：
//! - `{run_id}.md`            面向人类的回答正文
//! - `.{run_id}.raw.json`     原样保留的提供商响应（侧车）
//! - `.{run_id}.reasoning.txt` 提取出的推理文本（侧车）

use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::FileError;
use crate::models::response::ProviderResponse;
use crate::workflow::run_ctx::RunCtx;

/// 结果落盘服务
pub struct ResultSink {
    output_dir: PathBuf,
}

impl ResultSink {
    /// 创建新的落盘服务
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// 写出一次成功运行的全部产物，返回产物路径（正文在首位）
    pub async fn write_success(
        &self,
        ctx: &RunCtx,
        response: &ProviderResponse,
    ) -> Result<Vec<String>, FileError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| FileError::WriteFailed {
                path: self.output_dir.display().to_string(),
                source: e,
            })?;

        let answer_path = self.output_dir.join(format!("{}.md", ctx.run_id));
        let raw_path = self.output_dir.join(format!(".{}.raw.json", ctx.run_id));
        let reasoning_path = self
            .output_dir
            .join(format!(".{}.reasoning.txt", ctx.run_id));

        debug!("{} 写出产物: {}", ctx, answer_path.display());

        write_file(&answer_path, response.answer_text.as_bytes()).await?;

        let raw_json =
            serde_json::to_string_pretty(&response.raw).unwrap_or_else(|_| "{}".to_string());
        write_file(&raw_path, raw_json.as_bytes()).await?;
        write_file(&reasoning_path, response.reasoning_text.as_bytes()).await?;

        info!(
            "{} ✓ 产物已写盘: 正文 + 2 个侧车文件 (耗时 {:?})",
            ctx, response.latency
        );

        Ok(vec![
            answer_path.display().to_string(),
            raw_path.display().to_string(),
            reasoning_path.display().to_string(),
        ])
    }
}

async fn write_file(path: &std::path::Path, bytes: &[u8]) -> Result<(), FileError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| FileError::WriteFailed {
            path: path.display().to_string(),
            source: e,
        })
}

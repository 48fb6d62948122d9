//! 程序配置
//!
//! 配置面只覆盖运营参数（提供商选择、并发、超时、输出位置）。
//! 检索/推理强制校验、重试次数、退避表都不在配置面上。

use crate::error::{AppError, FileError};

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 提供商标识（openai-responses / openai-deep-research / google-gemini / tavily-research）
    pub provider: String,
    /// 模型名称（按提供商白名单校验）
    pub model: String,
    /// 推理力度（low / medium / high）
    pub reasoning_effort: String,
    /// 最大补全 token 数
    pub max_completion_tokens: u32,
    /// 提示词模板：内联文本，或 `@路径` 指向模板文件
    pub prompt_template: Option<String>,
    /// 要求提供商返回的响应段落（逗号分隔）
    pub include_fields: Vec<String>,
    /// 批处理并发流水线上限
    pub max_concurrency: usize,
    /// 新发起请求的 QPS 上限
    pub qps: f64,
    /// 单条目超时（秒）
    pub timeout_seconds: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 产物输出目录
    pub output_dir: String,
    /// 批处理输出格式（lines / json）
    pub output_format: String,
    /// 输出日志文件
    pub output_log_file: String,
    // --- OpenAI 配置 ---
    pub openai_api_key: String,
    pub openai_base_url: String,
    // --- Gemini 配置 ---
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    // --- Tavily 配置 ---
    pub tavily_api_key: String,
    pub tavily_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "openai-responses".to_string(),
            model: "gpt-5-mini".to_string(),
            reasoning_effort: "medium".to_string(),
            max_completion_tokens: 8192,
            prompt_template: None,
            include_fields: Vec::new(),
            max_concurrency: 4,
            qps: 2.0,
            timeout_seconds: 600,
            verbose_logging: false,
            output_dir: "output".to_string(),
            output_format: "lines".to_string(),
            output_log_file: "output.txt".to_string(),
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            gemini_api_key: String::new(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            tavily_api_key: String::new(),
            tavily_base_url: "https://api.tavily.com".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            provider: std::env::var("PROVIDER").unwrap_or(default.provider),
            model: std::env::var("MODEL").unwrap_or(default.model),
            reasoning_effort: std::env::var("REASONING_EFFORT").unwrap_or(default.reasoning_effort),
            max_completion_tokens: std::env::var("MAX_COMPLETION_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_completion_tokens),
            prompt_template: std::env::var("PROMPT_TEMPLATE").ok(),
            include_fields: std::env::var("INCLUDE_FIELDS").map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()).unwrap_or(default.include_fields),
            max_concurrency: std::env::var("MAX_CONCURRENCY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrency),
            qps: std::env::var("QPS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.qps),
            timeout_seconds: std::env::var("TIMEOUT_SECONDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.timeout_seconds),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            output_format: std::env::var("OUTPUT_FORMAT").unwrap_or(default.output_format),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or(default.openai_api_key),
            openai_base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(default.openai_base_url),
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or(default.gemini_api_key),
            gemini_base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(default.gemini_base_url),
            tavily_api_key: std::env::var("TAVILY_API_KEY").unwrap_or(default.tavily_api_key),
            tavily_base_url: std::env::var("TAVILY_BASE_URL").unwrap_or(default.tavily_base_url),
        }
    }

    /// 解析提示词模板
    ///
    /// 值以 `@` 开头时视作模板文件路径并读取其内容；读取失败让整个
    /// 运行在发出任何请求之前失败。
    pub fn resolve_prompt_template(&self) -> Result<Option<String>, AppError> {
        match &self.prompt_template {
            None => Ok(None),
            Some(value) => match value.strip_prefix('@') {
                None => Ok(Some(value.clone())),
                Some(path) => {
                    let content =
                        std::fs::read_to_string(path).map_err(|e| FileError::ReadFailed {
                            path: path.to_string(),
                            source: e,
                        })?;
                    Ok(Some(content))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_template_passes_through() {
        let config = Config {
            prompt_template: Some("对比 {{file_a}} 与 {{file_b}}".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_prompt_template().unwrap().unwrap(),
            "对比 {{file_a}} 与 {{file_b}}"
        );
    }

    #[test]
    fn test_at_prefix_reads_file() {
        let dir = std::env::temp_dir().join(format!("gqr_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("template.txt");
        std::fs::write(&path, "模板: {{file_a}} {{file_b}}").unwrap();

        let config = Config {
            prompt_template: Some(format!("@{}", path.display())),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_prompt_template().unwrap().unwrap(),
            "模板: {{file_a}} {{file_b}}"
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_template_file_is_error() {
        let config = Config {
            prompt_template: Some("@/nonexistent/template.txt".to_string()),
            ..Config::default()
        };
        assert!(config.resolve_prompt_template().is_err());
    }
}

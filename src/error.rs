//! 应用程序错误类型
//!
//! 错误分类与退出码协议对应：
//! - 结构性/配置错误（模板、模型、环境变量）→ 不重试，退出码 5
//! - 校验失败（缺少检索证据/推理过程）→ 可重试，耗尽后退出码 1-4
//! - 瞬态网络错误（超时、5xx、限流）→ 可重试，计入同一次数上限

use thiserror::Error;

/// 应用程序顶层错误
#[derive(Debug, Error)]
pub enum AppError {
    /// 提示词模板错误
    #[error("模板错误: {0}")]
    Template(#[from] TemplateError),
    /// 提供商 API 调用错误
    #[error("提供商错误: {0}")]
    Provider(#[from] ProviderError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 提示词模板错误
#[derive(Debug, Error)]
pub enum TemplateError {
    /// 模板缺少必需的占位符
    ///
    /// 缺占位符的模板会静默丢弃一份输入文档，必须立即拒绝。
    #[error("模板缺少占位符 {placeholder}")]
    MissingPlaceholder { placeholder: &'static str },
    /// 模板文件读取失败
    #[error("读取模板文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 提供商 API 调用错误
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 模型不在提供商白名单内，重试必然再次失败
    #[error("不支持的模型 (提供商: {provider}): {model}")]
    UnsupportedModel { provider: String, model: String },
    /// 网络请求失败（传输层）
    #[error("API 请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 请求频率限制 (HTTP 429)
    #[error("API 请求频率限制 (HTTP {status})")]
    RateLimited { status: u16 },
    /// 服务端错误 (HTTP 5xx)
    #[error("API 服务端错误 (HTTP {status})")]
    ServerError { status: u16 },
    /// 其他 4xx，重试不可能成功
    #[error("API 返回不可重试的错误 (HTTP {status}): {message}")]
    NonRetryable { status: u16, message: String },
    /// 响应体无法解析为 JSON
    #[error("响应解析失败: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// 该错误是否值得重试
    ///
    /// 429/5xx/传输错误属于瞬态错误；其他 4xx 和白名单拒绝重试必然再次失败。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RequestFailed { .. }
                | ProviderError::RateLimited { .. }
                | ProviderError::ServerError { .. }
        )
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 无法识别的提供商名称
    #[error("无法识别的提供商: {name}")]
    UnknownProvider { name: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

//! 运行请求模型
//!
//! `RunRequest` 是一次生成尝试的不可变描述。重试不会原地修改请求，
//! 而是通过 [`RunRequest::escalated`] 派生一份提示词已升级的新请求。

use crate::composer;
use crate::error::{ConfigError, TemplateError};
use crate::models::outcome::FailureKind;

/// 提供商类型（封闭集合，不做插件化）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// OpenAI Responses API
    OpenAiResponses,
    /// OpenAI Deep Research
    OpenAiDeepResearch,
    /// Google Gemini
    GoogleGemini,
    /// Tavily Research
    TavilyResearch,
}

impl ProviderKind {
    /// 获取标准名称（配置文件中使用的标识）
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAiResponses => "openai-responses",
            ProviderKind::OpenAiDeepResearch => "openai-deep-research",
            ProviderKind::GoogleGemini => "google-gemini",
            ProviderKind::TavilyResearch => "tavily-research",
        }
    }

    /// 从配置字符串解析提供商
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "openai-responses" | "openai" => Ok(ProviderKind::OpenAiResponses),
            "openai-deep-research" | "deep-research" => Ok(ProviderKind::OpenAiDeepResearch),
            "google-gemini" | "gemini" => Ok(ProviderKind::GoogleGemini),
            "tavily-research" | "tavily" => Ok(ProviderKind::TavilyResearch),
            _ => Err(ConfigError::UnknownProvider {
                name: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 推理力度
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// API 参数值
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }

    /// 从配置字符串解析，无法识别时回落到 medium
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => ReasoningEffort::Low,
            "high" => ReasoningEffort::High,
            _ => ReasoningEffort::Medium,
        }
    }
}

/// 提示词升级指令
///
/// 升级是追加式且幂等的：同一指令最多出现一次，后续尝试的提示词
/// 永远以前一次的提示词为前缀。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationDirective {
    /// 强调联网检索与引用格式
    WebSearchEmphasis,
    /// 强调逐步推理
    ReasoningEmphasis,
    /// 两者皆缺时的最高优先级措辞
    UrgentBoth,
}

impl EscalationDirective {
    /// 追加到提示词末尾的文本
    pub fn text(self) -> &'static str {
        match self {
            EscalationDirective::WebSearchEmphasis => {
                "\n\n【检索要求】回答前必须调用联网搜索工具检索相关资料，\
                 并在回答中以 [来源: URL] 的格式逐条标注引用来源。\
                 没有引用来源的回答会被拒绝。"
            }
            EscalationDirective::ReasoningEmphasis => {
                "\n\n【推理要求】请先逐步展示你的推理过程（step by step），\
                 再给出最终结论。推理过程必须单独成段，不能省略。"
            }
            EscalationDirective::UrgentBoth => {
                "\n\n【再次强调】上一次回答既没有联网检索证据也没有推理过程。\
                 本次回答必须同时满足：1) 调用联网搜索并标注引用来源；\
                 2) 展示完整的逐步推理。缺少任何一项都会被拒绝。"
            }
        }
    }
}

/// 一次生成尝试的不可变描述
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// 文档 A 原文
    pub file_a_content: String,
    /// 文档 B 原文
    pub file_b_content: String,
    /// 可选模板（含 `{{file_a}}`/`{{file_b}}` 占位符）
    pub prompt_template: Option<String>,
    /// 目标提供商
    pub provider: ProviderKind,
    /// 模型名称（按提供商白名单校验）
    pub model: String,
    /// 推理力度
    pub reasoning_effort: ReasoningEffort,
    /// 最大补全 token 数
    pub max_completion_tokens: u32,
    /// 要求返回的响应段落
    pub include_fields: Vec<String>,
    /// 组合后的基础提示词
    base_prompt: String,
    /// 已应用的升级指令（按应用顺序）
    escalations: Vec<EscalationDirective>,
}

impl RunRequest {
    /// 创建新的运行请求，组合提示词在此完成（失败即拒绝，不发起任何网络调用）
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_a_content: impl Into<String>,
        file_b_content: impl Into<String>,
        prompt_template: Option<String>,
        provider: ProviderKind,
        model: impl Into<String>,
        reasoning_effort: ReasoningEffort,
        max_completion_tokens: u32,
        include_fields: Vec<String>,
    ) -> Result<Self, TemplateError> {
        let file_a_content = file_a_content.into();
        let file_b_content = file_b_content.into();
        let base_prompt = composer::compose(
            &file_a_content,
            &file_b_content,
            prompt_template.as_deref(),
        )?;

        Ok(Self {
            file_a_content,
            file_b_content,
            prompt_template,
            provider,
            model: model.into(),
            reasoning_effort,
            max_completion_tokens,
            include_fields,
            base_prompt,
            escalations: Vec::new(),
        })
    }

    /// 当前完整提示词（基础提示词 + 已应用的升级文本）
    pub fn prompt(&self) -> String {
        let mut prompt = self.base_prompt.clone();
        for directive in &self.escalations {
            prompt.push_str(directive.text());
        }
        prompt
    }

    /// 根据失败类型派生一份提示词已升级的新请求
    ///
    /// 升级只追加、不替换，对同一指令幂等，保证第 k+1 次尝试的提示词
    /// 以第 k 次的提示词为前缀。
    pub fn escalated(&self, kind: FailureKind) -> Self {
        let mut next = self.clone();
        let mut apply = |d: EscalationDirective| {
            if !next.escalations.contains(&d) {
                next.escalations.push(d);
            }
        };

        match kind {
            FailureKind::MissingGrounding => apply(EscalationDirective::WebSearchEmphasis),
            FailureKind::MissingReasoning => apply(EscalationDirective::ReasoningEmphasis),
            FailureKind::MissingBoth => {
                apply(EscalationDirective::WebSearchEmphasis);
                apply(EscalationDirective::ReasoningEmphasis);
                apply(EscalationDirective::UrgentBoth);
            }
            // 无法归类的失败没有针对性的措辞可加
            FailureKind::UnknownFailure => {}
        }
        next
    }

    /// 已应用的升级指令（用于日志与测试断言）
    pub fn applied_escalations(&self) -> &[EscalationDirective] {
        &self.escalations
    }
}

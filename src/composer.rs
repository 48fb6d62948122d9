//! 提示词组合器
//!
//! 把两份输入文档合成为一条提示词。纯函数，无副作用。
//! 模板缺占位符时立即失败——静默丢弃一份输入会污染之后的每一次运行。

use crate::error::TemplateError;

/// 文档 A 占位符
pub const FILE_A_PLACEHOLDER: &str = "{{file_a}}";
/// 文档 B 占位符
pub const FILE_B_PLACEHOLDER: &str = "{{file_b}}";

/// 组合提示词
///
/// # 参数
/// - `file_a`: 文档 A 原文
/// - `file_b`: 文档 B 原文
/// - `template`: 可选模板，必须同时包含 `{{file_a}}` 和 `{{file_b}}`
///
/// # 返回
/// 组合后的提示词；模板缺占位符时返回 [`TemplateError::MissingPlaceholder`]
pub fn compose(
    file_a: &str,
    file_b: &str,
    template: Option<&str>,
) -> Result<String, TemplateError> {
    match template {
        Some(tpl) => {
            if !tpl.contains(FILE_A_PLACEHOLDER) {
                return Err(TemplateError::MissingPlaceholder {
                    placeholder: FILE_A_PLACEHOLDER,
                });
            }
            if !tpl.contains(FILE_B_PLACEHOLDER) {
                return Err(TemplateError::MissingPlaceholder {
                    placeholder: FILE_B_PLACEHOLDER,
                });
            }
            Ok(tpl
                .replace(FILE_A_PLACEHOLDER, file_a)
                .replace(FILE_B_PLACEHOLDER, file_b))
        }
        None => Ok(default_framing(file_a, file_b)),
    }
}

/// 无模板时的固定默认框架
fn default_framing(file_a: &str, file_b: &str) -> String {
    format!(
        "请调用联网搜索工具检索相关资料，对比分析下面两份文档，给出有引用来源、\
         有推理过程的结论。\n\n\
         ===== 文档 A =====\n{}\n\n\
         ===== 文档 B =====\n{}\n\n\
         要求：\n\
         1. 回答前先联网检索，并以 [来源: URL] 格式标注引用；\n\
         2. 给出逐步推理过程，再给最终结论。",
        file_a, file_b
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_framing_contains_both_documents() {
        let prompt = compose("甲文档内容", "乙文档内容", None).unwrap();
        assert!(prompt.contains("甲文档内容"));
        assert!(prompt.contains("乙文档内容"));
    }

    #[test]
    fn test_template_substitution() {
        let tpl = "对比 {{file_a}} 与 {{file_b}}，输出结论。";
        let prompt = compose("AAA", "BBB", Some(tpl)).unwrap();
        assert_eq!(prompt, "对比 AAA 与 BBB，输出结论。");
    }

    #[test]
    fn test_missing_file_b_placeholder_rejected() {
        let tpl = "只有 {{file_a}} 的模板";
        let err = compose("AAA", "BBB", Some(tpl)).unwrap_err();
        match err {
            TemplateError::MissingPlaceholder { placeholder } => {
                assert_eq!(placeholder, FILE_B_PLACEHOLDER);
            }
            other => panic!("期望 MissingPlaceholder，实际: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_a_placeholder_rejected() {
        let err = compose("AAA", "BBB", Some("只有 {{file_b}}")).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MissingPlaceholder {
                placeholder: FILE_A_PLACEHOLDER
            }
        ));
    }
}

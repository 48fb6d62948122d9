//! 检索/推理强制校验器 - 业务能力层
//!
//! 全系统唯一的"合格"定义。确定性纯函数，与提供商无关：
//! - 检索证据存在 ⇔ `grounding_evidence` 非空
//! - 推理过程存在 ⇔ `reasoning_text` 非空且有实质内容
//!
//! 校验器的签名没有"关闭"输入——强制校验不可被任何配置绕过。
//! 即使适配器提供融合式 `execute_and_verify`，最终结论也必须出自本函数。

use crate::models::outcome::{FailureKind, ValidationOutcome};
use crate::models::response::ProviderResponse;

/// 校验一次提供商响应
pub fn verify(response: &ProviderResponse) -> ValidationOutcome {
    // 原始报文连 JSON 对象都不是，无法归类
    if !response.raw.is_object() {
        return ValidationOutcome::Fail(FailureKind::UnknownFailure);
    }

    let grounded = !response.grounding_evidence.is_empty();
    let reasoned = is_substantive(&response.reasoning_text);

    match (grounded, reasoned) {
        (true, true) => ValidationOutcome::Pass,
        (false, true) => ValidationOutcome::Fail(FailureKind::MissingGrounding),
        (true, false) => ValidationOutcome::Fail(FailureKind::MissingReasoning),
        (false, false) => ValidationOutcome::Fail(FailureKind::MissingBoth),
    }
}

/// 推理文本是否有实质内容（不只是标点/空白）
fn is_substantive(text: &str) -> bool {
    text.chars().any(|c| c.is_alphanumeric())
}

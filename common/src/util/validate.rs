use std::borrow::Cow;
use validator::ValidationError;

/// 消息正文最大字符数（按去除首尾空白后的 Unicode 字符计）
pub const MAX_MESSAGE_LEN: usize = 2000;

/// 校验消息正文，返回去除首尾空白后的内容
pub fn validate_message_text(text: &str) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("text_empty").with_message(Cow::Borrowed("Message text is required")));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        return Err(ValidationError::new("text_too_long").with_message(Cow::Borrowed("Message text must be at most 2000 characters")));
    }
    Ok(trimmed)
}

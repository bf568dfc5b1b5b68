use uuid::Uuid;

/// 生成文档主键（32 位无连字符 UUID）
pub fn build_id() -> String {
    let uuid = Uuid::new_v4().simple();
    format!("{}", uuid)
}

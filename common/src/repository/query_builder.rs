use mongodb::bson::{Bson, Document, doc};

/// 过滤文档构造器
///
/// 同一组内的条件按字段合并（隐式 AND），调用 `or()` 开启下一组，
/// `build()` 时各组以 `$or` 连接。
#[derive(Debug, Default, Clone)]
pub struct QueryBuilder {
    clauses: Vec<Document>,
    current: Document,
    logic_op: Option<&'static str>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.current.insert(field, value.into());
        self
    }

    pub fn ne(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.current.insert(field, doc! { "$ne": value.into() });
        self
    }

    /// 字段为 null 或不存在
    pub fn is_null(mut self, field: &str) -> Self {
        self.current.insert(field, Bson::Null);
        self
    }

    pub fn in_array<T: Into<Bson>>(mut self, field: &str, values: Vec<T>) -> Self {
        let arr = values.into_iter().map(Into::into).collect::<Vec<_>>();
        self.current.insert(field, doc! { "$in": arr });
        self
    }

    pub fn or(mut self) -> Self {
        self.logic_op = Some("$or");
        self.push_current();
        self
    }

    fn push_current(&mut self) {
        if !self.current.is_empty() {
            self.clauses.push(std::mem::take(&mut self.current));
        }
    }

    pub fn build(mut self) -> Document {
        self.push_current();
        match self.logic_op {
            Some(op) if self.clauses.len() > 1 => doc! { op: self.clauses },
            _ if self.clauses.len() == 1 => self.clauses.remove(0),
            _ => doc! {},
        }
    }
}

//! 内存文档仓储
//!
//! 与 `BaseRepository` 实现同一个 [`Repository`] trait，解释 MongoDB 过滤/更新文档的常用子集：
//!
//! - 过滤：字段等值（数组字段为“包含”语义，null 匹配缺失字段）、`$or`、`$and`、
//!   `$eq`、`$ne`、`$in`、`$nin`、`$exists`、`$gt`、`$gte`、`$lt`、`$lte`
//! - 更新：`$set`、`$unset`、`$push`、`$addToSet`、`$pull`
//! - 排序：多字段 `1` / `-1`，稳定排序
//!
//! 数据不落盘，用于测试和本地调试（`database.kind = "memory"`）。

use crate::errors::AppError;
use crate::repository_util::{RepoResult, Repository};
use async_trait::async_trait;
use mongodb::bson::{self, Bson, Document};
use serde::{Serialize, de::DeserializeOwned};
use std::cmp::Ordering;
use std::marker::PhantomData;
use tokio::sync::RwLock;

pub struct MemoryRepository<T> {
    docs: RwLock<Vec<Document>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MemoryRepository<T> {
    pub fn new() -> Self {
        Self { docs: RwLock::new(Vec::new()), _marker: PhantomData }
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Repository<T> for MemoryRepository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn find_one(&self, filter: Document) -> RepoResult<Option<T>> {
        let docs = self.docs.read().await;
        match docs.iter().find(|d| matches(d, &filter)) {
            Some(d) => Ok(Some(bson::from_document(d.clone())?)),
            None => Ok(None),
        }
    }

    async fn query(&self, filter: Document, sort: Option<Document>) -> RepoResult<Vec<T>> {
        let mut found: Vec<Document> = {
            let docs = self.docs.read().await;
            docs.iter().filter(|d| matches(d, &filter)).cloned().collect()
        };
        if let Some(sort) = sort {
            found.sort_by(|a, b| compare_by(a, b, &sort));
        }
        found.into_iter().map(|d| bson::from_document(d).map_err(AppError::from)).collect()
    }

    async fn insert(&self, entity: &T) -> RepoResult<()> {
        let document = bson::to_document(entity)?;
        let mut docs = self.docs.write().await;
        if let Some(id) = document.get("_id") {
            if docs.iter().any(|d| d.get("_id") == Some(id)) {
                return Err(AppError::Internal(format!("duplicate key _id: {}", id)));
            }
        }
        docs.push(document);
        Ok(())
    }

    async fn update_one(&self, filter: Document, update: Document) -> RepoResult<u64> {
        let mut docs = self.docs.write().await;
        match docs.iter_mut().find(|d| matches(d, &filter)) {
            Some(d) => apply_update(d, &update),
            None => Ok(0),
        }
    }

    async fn update(&self, filter: Document, update: Document) -> RepoResult<u64> {
        let mut docs = self.docs.write().await;
        let mut modified = 0;
        for d in docs.iter_mut().filter(|d| matches(d, &filter)) {
            modified += apply_update(d, &update)?;
        }
        Ok(modified)
    }

    async fn delete(&self, filter: Document) -> RepoResult<u64> {
        let mut docs = self.docs.write().await;
        let before = docs.len();
        docs.retain(|d| !matches(d, &filter));
        Ok((before - docs.len()) as u64)
    }

    async fn count(&self, filter: Document) -> RepoResult<u64> {
        let docs = self.docs.read().await;
        Ok(docs.iter().filter(|d| matches(d, &filter)).count() as u64)
    }
}

/// 判断文档是否满足过滤条件
pub fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, cond)| match key.as_str() {
        "$or" => sub_filters(cond).any(|f| matches(doc, f)),
        "$and" => sub_filters(cond).all(|f| matches(doc, f)),
        field => field_matches(doc.get(field), cond),
    })
}

fn sub_filters(cond: &Bson) -> impl Iterator<Item = &Document> {
    cond.as_array().into_iter().flatten().filter_map(Bson::as_document)
}

fn field_matches(value: Option<&Bson>, cond: &Bson) -> bool {
    if let Bson::Document(ops) = cond {
        if ops.keys().next().is_some_and(|k| k.starts_with('$')) {
            return ops.iter().all(|(op, arg)| operator_matches(value, op, arg));
        }
    }
    value_eq(value, cond)
}

fn operator_matches(value: Option<&Bson>, op: &str, arg: &Bson) -> bool {
    match op {
        "$eq" => value_eq(value, arg),
        "$ne" => !value_eq(value, arg),
        "$in" => arg.as_array().is_some_and(|items| items.iter().any(|x| value_eq(value, x))),
        "$nin" => !arg.as_array().is_some_and(|items| items.iter().any(|x| value_eq(value, x))),
        "$exists" => arg.as_bool() == Some(value.is_some()),
        "$gt" => value.and_then(|v| compare(v, arg)) == Some(Ordering::Greater),
        "$gte" => matches!(value.and_then(|v| compare(v, arg)), Some(Ordering::Greater | Ordering::Equal)),
        "$lt" => value.and_then(|v| compare(v, arg)) == Some(Ordering::Less),
        "$lte" => matches!(value.and_then(|v| compare(v, arg)), Some(Ordering::Less | Ordering::Equal)),
        _ => false,
    }
}

fn value_eq(value: Option<&Bson>, expected: &Bson) -> bool {
    match (value, expected) {
        (None | Some(Bson::Null), Bson::Null) => true,
        (None, _) => false,
        (Some(Bson::Array(items)), expected) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| scalar_eq(item, expected))
        }
        (Some(v), expected) => scalar_eq(v, expected),
    }
}

fn scalar_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_by(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let ordering = match (a.get(field), b.get(field)) {
            (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = if as_f64(direction).is_some_and(|d| d < 0.0) { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// 执行更新操作符，返回是否产生了实际修改（0/1）
fn apply_update(doc: &mut Document, update: &Document) -> RepoResult<u64> {
    let before = doc.clone();
    for (op, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| AppError::Internal(format!("update operator {} expects a document", op)))?;
        for (field, value) in fields {
            match op.as_str() {
                "$set" => {
                    doc.insert(field.as_str(), value.clone());
                }
                "$unset" => {
                    doc.remove(field);
                }
                "$push" => array_entry(doc, field)?.push(value.clone()),
                "$addToSet" => {
                    let items = array_entry(doc, field)?;
                    if !items.iter().any(|item| scalar_eq(item, value)) {
                        items.push(value.clone());
                    }
                }
                "$pull" => array_entry(doc, field)?.retain(|item| !scalar_eq(item, value)),
                other => return Err(AppError::Internal(format!("unsupported update operator {}", other))),
            }
        }
    }
    Ok(if *doc != before { 1 } else { 0 })
}

fn array_entry<'a>(doc: &'a mut Document, field: &str) -> RepoResult<&'a mut Vec<Bson>> {
    if matches!(doc.get(field), None | Some(Bson::Null)) {
        doc.insert(field, Bson::Array(Vec::new()));
    }
    match doc.get_mut(field) {
        Some(Bson::Array(items)) => Ok(items),
        _ => Err(AppError::Internal(format!("field {} is not an array", field))),
    }
}

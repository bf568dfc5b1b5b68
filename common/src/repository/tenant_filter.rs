use crate::errors::AppError;
use crate::repository_util::{RepoResult, Repository};
use mongodb::bson::{self, Document, doc};
use serde::Serialize;

/// 所有租户数据共用的租户字段名
pub const TENANT_FIELD: &str = "tenantId";

/// 把租户等值条件合并进查询（或文档）
///
/// 传入的 `tenantId` 会覆盖调用方自带的同名条件；`tenant_id` 为空时原样返回。
pub fn scope(mut query: Document, tenant_id: Option<&str>) -> Document {
    if let Some(tenant_id) = tenant_id {
        query.insert(TENANT_FIELD, tenant_id);
    }
    query
}

/// 绑定租户的仓储视图，所有读写都先经过 [`scope`]
pub struct TenantScoped<'a, T> {
    repo: &'a dyn Repository<T>,
    tenant_id: &'a str,
}

impl<'a, T> TenantScoped<'a, T>
where
    T: Serialize + Send + Sync,
{
    pub fn new(repo: &'a dyn Repository<T>, tenant_id: &'a str) -> Self {
        Self { repo, tenant_id }
    }

    pub fn tenant_id(&self) -> &'a str {
        self.tenant_id
    }

    fn filter(&self, filter: Document) -> Document {
        scope(filter, Some(self.tenant_id))
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<T>> {
        self.repo.find_one(self.filter(doc! { "_id": id })).await
    }

    pub async fn query(&self, filter: Document, sort: Option<Document>) -> RepoResult<Vec<T>> {
        self.repo.query(self.filter(filter), sort).await
    }

    /// 写入前校验实体的租户字段与当前作用域一致
    pub async fn insert(&self, entity: &T) -> RepoResult<()> {
        let document = bson::to_document(entity)?;
        if document.get_str(TENANT_FIELD).ok() != Some(self.tenant_id) {
            return Err(AppError::Validation("Entity does not belong to the current tenant".to_string()));
        }
        self.repo.insert(entity).await
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> RepoResult<u64> {
        self.repo.update_one(self.filter(filter), update).await
    }

    pub async fn update(&self, filter: Document, update: Document) -> RepoResult<u64> {
        self.repo.update(self.filter(filter), update).await
    }

    pub async fn delete(&self, filter: Document) -> RepoResult<u64> {
        self.repo.delete(self.filter(filter)).await
    }

    pub async fn count(&self, filter: Document) -> RepoResult<u64> {
        self.repo.count(self.filter(filter)).await
    }
}

use crate::errors::AppError;
use crate::index_trait::MongoIndexModelProvider;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::{Collection, Database};
use serde::{Serialize, de::DeserializeOwned};

pub type RepoResult<T> = Result<T, AppError>;

/// 文档仓储抽象，MongoDB 与内存实现共用同一套过滤/更新文档语义
#[async_trait]
pub trait Repository<T>: Send + Sync {
    async fn find_by_id(&self, id: &str) -> RepoResult<Option<T>> {
        self.find_one(doc! { "_id": id }).await
    }
    async fn find_one(&self, filter: Document) -> RepoResult<Option<T>>;
    /// 按过滤条件查询，`sort` 形如 `{ "createdAt": 1 }`
    async fn query(&self, filter: Document, sort: Option<Document>) -> RepoResult<Vec<T>>;
    async fn insert(&self, entity: &T) -> RepoResult<()>;
    async fn update_one(&self, filter: Document, update: Document) -> RepoResult<u64>;
    async fn update(&self, filter: Document, update: Document) -> RepoResult<u64>;
    async fn delete(&self, filter: Document) -> RepoResult<u64>;
    async fn count(&self, filter: Document) -> RepoResult<u64>;
}

#[derive(Debug)]
pub struct BaseRepository<T: Send + Sync> {
    pub collection: Collection<T>,
}

impl<T: Send + Sync> BaseRepository<T> {
    pub fn new(db: &Database, name: &str) -> Self {
        Self { collection: db.collection::<T>(name) }
    }
}

impl<T> BaseRepository<T>
where
    T: MongoIndexModelProvider + Send + Sync,
{
    pub async fn ensure_indexes(&self) -> RepoResult<()> {
        let models = T::index_models();
        if models.is_empty() {
            return Ok(());
        }
        self.collection.create_indexes(models).await?;
        Ok(())
    }
}

#[async_trait]
impl<T> Repository<T> for BaseRepository<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    async fn find_one(&self, filter: Document) -> RepoResult<Option<T>> {
        let result = self.collection.find_one(filter).await?;
        Ok(result)
    }

    async fn query(&self, filter: Document, sort: Option<Document>) -> RepoResult<Vec<T>> {
        let mut find = self.collection.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        let mut cursor = find.await?;
        let mut result = vec![];
        while let Some(doc) = cursor.try_next().await? {
            result.push(doc);
        }
        Ok(result)
    }

    async fn insert(&self, entity: &T) -> RepoResult<()> {
        self.collection.insert_one(entity).await?;
        Ok(())
    }

    async fn update_one(&self, filter: Document, update: Document) -> RepoResult<u64> {
        let result = self.collection.update_one(filter, update).await?;
        Ok(result.modified_count)
    }

    async fn update(&self, filter: Document, update: Document) -> RepoResult<u64> {
        let result = self.collection.update_many(filter, update).await?;
        Ok(result.modified_count)
    }

    async fn delete(&self, filter: Document) -> RepoResult<u64> {
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    async fn count(&self, filter: Document) -> RepoResult<u64> {
        let total = self.collection.count_documents(filter).await?;
        Ok(total)
    }
}

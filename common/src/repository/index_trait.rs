use mongodb::IndexModel;

/// 实体声明自己需要的 MongoDB 索引，启动时由 `BaseRepository::ensure_indexes` 创建
pub trait MongoIndexModelProvider {
    fn index_models() -> Vec<IndexModel>;
}

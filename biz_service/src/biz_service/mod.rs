pub mod cache_service;
pub mod message_service;
pub mod participant_service;

use crate::entitys::message_entity::MessageEntity;
use crate::entitys::participant_entity::{AdminEntity, MemberEntity};
use common::errors::AppError;
use common::memory_repository::MemoryRepository;
use common::repository_util::{BaseRepository, Repository};
use mongodb::Database;
use std::sync::Arc;

pub const MESSAGE_COLLECTION: &str = "messages";
pub const ADMIN_COLLECTION: &str = "admins";
pub const MEMBER_COLLECTION: &str = "members";

/// 业务服务使用的仓储集合
#[derive(Clone)]
pub struct Repositories {
    pub messages: Arc<dyn Repository<MessageEntity>>,
    pub admins: Arc<dyn Repository<AdminEntity>>,
    pub members: Arc<dyn Repository<MemberEntity>>,
}

impl Repositories {
    /// MongoDB 仓储，同时创建各集合索引
    pub async fn mongo(db: &Database) -> Result<Self, AppError> {
        let messages = BaseRepository::<MessageEntity>::new(db, MESSAGE_COLLECTION);
        let admins = BaseRepository::<AdminEntity>::new(db, ADMIN_COLLECTION);
        let members = BaseRepository::<MemberEntity>::new(db, MEMBER_COLLECTION);
        messages.ensure_indexes().await?;
        admins.ensure_indexes().await?;
        members.ensure_indexes().await?;
        Ok(Self { messages: Arc::new(messages), admins: Arc::new(admins), members: Arc::new(members) })
    }

    pub fn memory() -> Self {
        Self {
            messages: Arc::new(MemoryRepository::<MessageEntity>::new()),
            admins: Arc::new(MemoryRepository::<AdminEntity>::new()),
            members: Arc::new(MemoryRepository::<MemberEntity>::new()),
        }
    }
}

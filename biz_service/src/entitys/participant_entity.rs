use common::index_trait::MongoIndexModelProvider;
use mongodb::IndexModel;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 场馆管理员账号，集合 `admins`
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminEntity {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    /// 真实姓名，不对会员展示
    pub name: String,
    pub email: Option<String>,
    pub created_at: i64,
}

/// 场馆会员（学员），集合 `members`
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberEntity {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub created_at: i64,
}

impl MongoIndexModelProvider for AdminEntity {
    fn index_models() -> Vec<IndexModel> {
        vec![IndexModel::builder().keys(doc! { "tenantId": 1 }).build()]
    }
}

impl MongoIndexModelProvider for MemberEntity {
    fn index_models() -> Vec<IndexModel> {
        vec![IndexModel::builder().keys(doc! { "tenantId": 1 }).build()]
    }
}

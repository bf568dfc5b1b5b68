use crate::biz_service::cache_service::CacheService;
use crate::entitys::message_entity::ParticipantKind;
use crate::entitys::message_view::ParticipantRef;
use crate::entitys::participant_entity::{AdminEntity, MemberEntity};
use common::config::CacheConfig;
use common::errors::AppError;
use common::repository_util::Repository;
use common::tenant_filter::TenantScoped;
use std::sync::Arc;

/// 管理员对会员统一展示的名称
pub const ADMIN_DISPLAY_NAME: &str = "Admin";

/// 只给出 ID 时的查找顺序：先会员，后管理员
const LOOKUP_ORDER: [ParticipantKind; 2] = [ParticipantKind::Member, ParticipantKind::Admin];

/// 参与者解析：ID + 类型 -> 对外展示信息
pub struct ParticipantService {
    admins: Arc<dyn Repository<AdminEntity>>,
    members: Arc<dyn Repository<MemberEntity>>,
    cache: CacheService<ParticipantRef>,
}

impl ParticipantService {
    pub fn new(admins: Arc<dyn Repository<AdminEntity>>, members: Arc<dyn Repository<MemberEntity>>, cache_config: &CacheConfig) -> Self {
        let cache = CacheService::new(cache_config.participant_ttl_secs, cache_config.participant_capacity);
        Self { admins, members, cache }
    }

    /// 在租户内解析指定类型的参与者，不存在时返回 `None`
    pub async fn resolve(&self, tenant_id: &str, id: &str, kind: ParticipantKind) -> Result<Option<ParticipantRef>, AppError> {
        let cache_key = format!("{}:{}:{}", tenant_id, kind, id);
        if let Some(hit) = self.cache.get(&cache_key) {
            return Ok(Some(hit));
        }

        let resolved = match kind {
            ParticipantKind::Admin => TenantScoped::new(self.admins.as_ref(), tenant_id)
                .find_by_id(id)
                .await?
                .map(|admin| ParticipantRef { id: admin.id, name: ADMIN_DISPLAY_NAME.to_string(), kind }),
            ParticipantKind::Member => TenantScoped::new(self.members.as_ref(), tenant_id)
                .find_by_id(id)
                .await?
                .map(|member| ParticipantRef { id: member.id, name: member.name, kind }),
        };

        if let Some(participant) = &resolved {
            self.cache.insert(cache_key, participant.clone());
        }
        Ok(resolved)
    }

    /// 类型未知时依次查找会员、管理员
    pub async fn identify_kind(&self, tenant_id: &str, id: &str) -> Result<Option<ParticipantRef>, AppError> {
        for kind in LOOKUP_ORDER {
            if let Some(participant) = self.resolve(tenant_id, id, kind).await? {
                return Ok(Some(participant));
            }
        }
        Ok(None)
    }
}

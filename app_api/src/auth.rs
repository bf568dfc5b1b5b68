//! 调用方身份
//!
//! 认证由上游网关完成，网关通过请求头透传用户、角色和租户，缺失或非法一律 401。

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use biz_service::entitys::message_entity::ParticipantKind;
use common::errors::AppError;
use std::future::{Ready, ready};
use std::str::FromStr;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub role: ParticipantKind,
    pub tenant_id: String,
}

impl AuthUser {
    pub fn build(req: &HttpRequest) -> Result<Self, AppError> {
        let user_id = header(req, USER_ID_HEADER)?;
        let tenant_id = header(req, TENANT_ID_HEADER)?;
        let role = header(req, USER_ROLE_HEADER)?;
        let role = ParticipantKind::from_str(&role).map_err(|_| AppError::Unauthorized(format!("invalid {}", USER_ROLE_HEADER)))?;
        Ok(Self { user_id, role, tenant_id })
    }
}

fn header(req: &HttpRequest, name: &str) -> Result<String, AppError> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {}", name)))
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(AuthUser::build(req))
    }
}

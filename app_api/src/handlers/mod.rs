pub mod message_handler;
pub mod swagger;

use actix_web::web;
use common::errors::AppError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    // 请求体解析失败统一走 {code, msg}
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| AppError::Validation(err.to_string()).into()));
    swagger::configure(cfg);
    message_handler::configure(cfg);
}

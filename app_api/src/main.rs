use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use app_api::handlers;
use app_socket::manager::job_manager::start_heartbeat_cleaner;
use app_socket::manager::socket_manager::SocketManager;
use app_socket::socket::socket_server::start_server;
use biz_service::biz_service::Repositories;
use biz_service::biz_service::message_service::MessageService;
use biz_service::biz_service::participant_service::ParticipantService;
use biz_service::events::MessageOutbox;
use common::config::{AppConfig, StoreKind};
use common::db::init_db;
use log::{info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 读取配置文件，可通过第一个参数指定
    let config_file = std::env::args().nth(1).unwrap_or_else(|| "api-config.toml".to_string());
    let app_cfg = AppConfig::new(&config_file)?;

    // 初始化日志
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(app_cfg.get_sys().log_level)).init();

    let db_cfg = app_cfg.get_database();
    let repositories = match db_cfg.kind {
        StoreKind::Mongo => {
            let db = init_db(&db_cfg).await?;
            info!("🗄️ MongoDB 已连接 {}", db_cfg.db_name);
            Repositories::mongo(&db).await?
        }
        StoreKind::Memory => {
            warn!("使用内存存储，重启后数据丢失");
            Repositories::memory()
        }
    };

    let participants = Arc::new(ParticipantService::new(repositories.admins.clone(), repositories.members.clone(), &app_cfg.get_cache()));
    let outbox = MessageOutbox::default();
    let message_service = web::Data::new(MessageService::new(repositories.messages.clone(), Arc::clone(&participants), outbox.clone()));

    // 推送服务
    let socket_cfg = app_cfg.get_socket();
    let socket_manager = Arc::new(SocketManager::new());
    let listener = TcpListener::bind(format!("{}:{}", socket_cfg.host, socket_cfg.port)).await?;
    tokio::spawn(start_heartbeat_cleaner(Arc::clone(&socket_manager), socket_cfg.heartbeat_timeout_secs));
    {
        let socket_manager = Arc::clone(&socket_manager);
        tokio::spawn(async move {
            if let Err(e) = start_server(listener, socket_manager, participants, &outbox).await {
                log::error!("❌ 推送服务异常退出: {:?}", e);
            }
        });
    }

    let server_cfg = app_cfg.get_server();
    let address_and_port = format!("{}:{}", server_cfg.host, server_cfg.port);
    info!("Starting server on {}", address_and_port);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(message_service.clone())
            // 配置 控制器
            .configure(handlers::configure)
    })
    .bind(address_and_port)?
    .run()
    .await?;
    Ok(())
}

use anyhow::{Context, Result};
use config::Config;
use serde::Deserialize;

/// 应用配置，来源于 TOML 文件 + `APP__` 前缀的环境变量
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub database: Option<DatabaseConfig>,
    pub server: Option<ServerConfig>,
    pub socket: Option<SocketConfig>,
    pub sys: Option<SysConfig>,
    pub cache: Option<CacheConfig>,
}

impl AppConfig {
    pub fn new(file: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(config::File::with_name(file).required(true))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()
            .with_context(|| format!("Failed to build configuration from {}", file))?;
        let cfg = config.try_deserialize::<AppConfig>().context("Failed to deserialize configuration")?;
        Ok(cfg)
    }

    pub fn get_database(&self) -> DatabaseConfig {
        self.database.clone().unwrap_or_default()
    }
    pub fn get_server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }
    pub fn get_socket(&self) -> SocketConfig {
        self.socket.clone().unwrap_or_default()
    }
    pub fn get_sys(&self) -> SysConfig {
        self.sys.clone().unwrap_or_default()
    }
    pub fn get_cache(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }
}

/// 存储后端：生产使用 MongoDB，本地调试可用内存
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Mongo,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub kind: StoreKind,
    pub url: String,
    pub db_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { kind: StoreKind::Mongo, url: "mongodb://127.0.0.1:27017".to_string(), db_name: "gym".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

/// 推送通道（TCP 长连接）配置
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SocketConfig {
    pub host: String,
    pub port: u16,
    /// 超过该秒数没有任何上行帧的连接会被清理
    pub heartbeat_timeout_secs: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 9000, heartbeat_timeout_secs: 90 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SysConfig {
    //全局日志级别
    pub log_level: String,
}

impl Default for SysConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub participant_ttl_secs: u64,
    pub participant_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { participant_ttl_secs: 300, participant_capacity: 10_000 }
    }
}

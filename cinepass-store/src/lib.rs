pub mod app_config;
pub mod http_client;
pub mod redis_repo;

pub use http_client::HttpOrderGateway;
pub use redis_repo::RedisClient;

pub mod config;
pub mod db;
pub mod fetch;
pub mod http;
pub mod lock;
pub mod periods;
pub mod repositories;
pub mod request_id;
pub mod transport;

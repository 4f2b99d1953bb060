pub mod auth;
pub mod config;
pub mod gateway;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod notify;
pub mod observability;
pub mod schedule;
pub mod sql;
pub mod store;
pub mod tls;
pub mod validate;
pub mod wal;
pub mod wire;

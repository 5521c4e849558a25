pub mod api;
pub mod backup;
pub mod booking;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod repository;
pub mod scheduler;
pub mod validate;
pub mod wal;

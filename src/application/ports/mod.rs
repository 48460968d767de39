pub mod access_repository;
pub mod cache_port;
pub mod snapshot_store;

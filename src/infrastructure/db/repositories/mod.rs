pub mod access_repository_sqlx;
pub mod snapshot_repository_sqlx;

pub use access_repository_sqlx::SqlxAccessRepository;
pub use snapshot_repository_sqlx::SqlxSnapshotRepository;

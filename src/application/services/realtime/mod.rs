pub mod clock;
pub mod metrics;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod snapshot;
pub mod sweeper;

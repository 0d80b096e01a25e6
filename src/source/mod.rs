pub mod discover;
pub mod tail;

pub use discover::GlobDiscovery;
pub use tail::TailWorker;

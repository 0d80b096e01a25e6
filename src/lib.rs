pub mod cli;
pub mod config;
pub mod dispatch;
pub mod event;
pub mod inject;
pub mod rotate;
pub mod sink;
pub mod source;

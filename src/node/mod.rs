pub mod config;
pub mod context;
pub mod ctl;
pub mod ops;

pub use config::NodeConfig;
pub use context::NodePaths;
pub use ctl::NodeCtl;
pub use ops::{LocalOps, NodeOps};

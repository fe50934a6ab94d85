pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod node;
pub mod shutdown;

pub use config::ClusterContext;
pub use dispatch::Dispatcher;
pub use error::{Result, SupervisorError};

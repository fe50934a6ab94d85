pub mod command;
pub mod dispatcher;
pub mod job;
pub mod process;
pub mod registry;
pub mod request;

pub use command::{CommandBuilder, NodeCtlCommand};
pub use dispatcher::Dispatcher;
pub use job::{Job, JobOutcome};
pub use process::{ProcessHandle, ProcessLauncher, ProcessStatus, TokioLauncher};
pub use registry::JobRegistry;
pub use request::{CleanMode, ControlRequest, JobKey, NodeAction, RequestArgs};

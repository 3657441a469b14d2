pub mod mysql;
pub mod runner;

pub use crate::domain::model::{CommandOutput, StepOutcome, TaskReport};
pub use crate::domain::ports::{RemoteSession, Task};
pub use crate::utils::error::Result;

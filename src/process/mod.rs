mod mock;
mod runner;

pub use mock::MockCommandRunner;
pub use runner::{CommandOutput, CommandRunner, TokioCommandRunner};

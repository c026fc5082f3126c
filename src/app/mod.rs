mod orchestrator;
mod runtime;
mod types;


pub use orchestrator::MirrorApp;
pub use types::ShutdownReason;

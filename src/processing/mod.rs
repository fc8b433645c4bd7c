pub mod dispatch;
pub mod orchestrator;
pub mod post;
pub mod pre;

pub use orchestrator::ProcessingOrchestrator;

mod conversation;
mod decode;
mod description_synthesizer;
pub mod extractor;
mod graph_synthesizer;
pub mod orchestrator;
mod pipeline;
mod publisher;
mod script_versions;
mod session_locks;

pub use conversation::*;
pub use decode::*;
pub use description_synthesizer::*;
pub use graph_synthesizer::*;
pub use orchestrator::*;
pub use pipeline::*;
pub use publisher::*;
pub use script_versions::*;
pub use session_locks::*;

mod artifact;
mod backend;
mod description;
mod graph;
mod history;
mod role;
mod script;
mod session;
mod store;

pub use artifact::*;
pub use backend::*;
pub use description::*;
pub use graph::*;
pub use history::*;
pub use role::*;
pub use script::*;
pub use session::*;
pub use store::*;

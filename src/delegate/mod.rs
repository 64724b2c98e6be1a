pub mod tool;

pub use tool::{Tool, ToolDelegate, Toolbox};

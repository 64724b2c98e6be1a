pub mod archive;
pub mod build;
pub mod cli;
pub mod config;
pub mod constants;
pub mod delegate;
pub mod exchange;
pub mod fileset;
pub mod hooks;
pub mod inject;
pub mod logging;
pub mod options;
pub mod project;
pub mod scopes;
pub mod serve;
pub mod strip;
pub mod util;
pub mod validate;

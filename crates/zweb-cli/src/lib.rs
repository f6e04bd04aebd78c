//! # z-web CLI
//!
//! Command-line front end for publishing directories as encrypted sites and
//! serving them back locally.
//!
//! ```text
//! z-web publish <name> <dir>   encrypt and upload a directory
//! z-web get <name>             fetch and serve on localhost
//! z-web browse <name>          fetch, serve and open the browser
//! z-web remove <name>          release a site and forget its keys
//! z-web list                   show published sites
//! ```

pub mod commands;
pub mod config;

pub use commands::{run, Command};
pub use config::CliConfig;

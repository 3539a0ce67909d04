//! # tiergraf
//!
//! Command-line front end of tiergraf-core. The binary in `main.rs` parses
//! arguments, installs logging and hands over to [`cli::execute`].

pub mod cli;

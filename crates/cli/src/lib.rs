//! Command-line front end for the gallery core
pub mod args;
pub mod commands;

//! CLI module for bgloop - command-line interface and subcommands.
//!
//! Provides the demo entry point: run a background loop and print what it did,
//! or show the effective configuration.

pub mod commands;

pub use commands::Cli;

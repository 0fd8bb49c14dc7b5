//! Harbormaster Migration Library
//!
//! Everything the `harbormaster-migrate` binary does, minus process setup:
//! argument parsing, the command handlers, this project's migrations, and the
//! `generate` scaffolding.

pub mod cli;
pub mod commands;
pub mod migrations;
pub mod scaffold;

//! Keel CLI - command-line interface for Keel schema migrations.
//!
//! This crate provides the `keel` binary, which applies, reverts and reports
//! on the migrations in a project's migrations directory against a SQLite
//! database.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;

//! CLI module for the marketplace cache
//!
//! Operator subcommands against the configured cache and database:
//! - `get` / `get-multi`: read entities through the cache
//! - `flush`: drop every cache entry
//! - `bump`: start a user's bump cooldown
//! - `config`: read a settings value

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};

/// Marketplace cache - read-through caching repositories
#[derive(Parser)]
#[command(name = "marketplace-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read one entity through the cache
    Get { entity: EntityKind, id: i64 },

    /// Read several entities through the cache in one batch
    GetMulti {
        entity: EntityKind,
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Drop every cache entry and the local config memo
    Flush,

    /// Start the bump cooldown of a user
    Bump { user_id: i64 },

    /// Read a value from the configs table
    Config { name: String },
}

/// Cached entity kinds
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Item,
    Shipping,
    TransactionEvidence,
}

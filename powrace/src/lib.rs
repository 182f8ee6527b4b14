// Copyright (c) 2024 Botho Foundation

//! powrace node library - miners racing a proof-of-work puzzle per batch.
//!
//! Each miner batches submitted transactions, searches for a nonce whose
//! block hash meets the difficulty target, and announces the win to its
//! peers. Peers verify the announcement against their own copy of the
//! batch, adopt the block and cancel their own search for that round.

#![deny(clippy::print_stdout)]

pub mod block;
pub mod config;
pub mod consensus;
pub mod ledger;
pub mod mempool;
pub mod network;
pub mod node;
pub mod telemetry;
pub mod transaction;

// Re-export commands module for CLI binary
pub mod commands;

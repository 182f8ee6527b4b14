// Copyright (c) 2024 Botho Foundation
//
//! Common test utilities for integration tests.
//!
//! Provides an in-process network of miners connected through
//! `LocalNetwork`, so tests can focus on their scenario instead of wiring.
//!
//! # Example
//!
//! ```ignore
//! use common::{TestNetwork, TestNetworkConfig};
//!
//! let mut network = TestNetwork::build(TestNetworkConfig::default());
//! network.submit(0, transactions);
//! assert!(network.wait_for_height(1, DEFAULT_TIMEOUT));
//! network.verify_consistency();
//! network.stop();
//! ```

#![allow(dead_code)]

mod network;

pub use network::*;

use std::time::Duration;

/// Default number of miners
pub const DEFAULT_NUM_NODES: usize = 3;

/// Default batch size
pub const DEFAULT_BATCH_SIZE: usize = 4;

/// Default difficulty, low enough for fast tests
pub const DEFAULT_DIFFICULTY: u32 = 1;

/// How long tests wait for miners to converge
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

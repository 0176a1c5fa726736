//! # p2pspace-testkit
//!
//! Shared fixtures for the p2pspace workspace tests: spaces with a root
//! identity and genesis, joining members, event chains, and a manual clock.

pub mod fixtures;

pub use fixtures::{ManualClock, TestMember, TestSpace};

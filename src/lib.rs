//! mirrorfs: Synchronizing Content-Addressed Filesystem
//!
//! A filesystem whose every directory and file is a node in a Merkle tree
//! addressed by a blake3 hash. Local edits are committed as versioned roots;
//! a sync worker pulls remote roots (fast-forward or merge) and pushes local
//! ones behind an optimistic version check.

pub mod cli;
pub mod concurrency;
pub mod config;
pub mod control;
pub mod error;
pub mod fs;
pub mod heads;
pub mod logging;
pub mod mount;
pub mod store;
pub mod sync;
pub mod tree;
pub mod types;

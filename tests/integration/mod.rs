//! Integration tests for the synchronizing Merkle filesystem

mod config_integration;
mod immutable_mount;
mod mount_resolver;
mod node_model;
mod pull_push;
mod sync_worker;
pub mod test_utils;

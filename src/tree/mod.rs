//! Merkle node model
//!
//! Node records, their canonical hashing, the in-memory working tree, and the
//! chunked content layer that turns file bytes into blobs.

pub mod buffer;
pub mod chunker;
pub mod hasher;
pub mod meta;
pub mod node;
pub mod path;

pub use meta::{ChunkRef, Meta, NodeKind};
pub use node::{FileState, Node, NodeState, Tree};

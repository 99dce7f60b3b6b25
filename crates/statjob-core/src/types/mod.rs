//! Core type definitions used across the StatJob workspace.

pub mod id;

pub use id::*;

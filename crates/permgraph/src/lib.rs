//! Permgraph - a permission dependency graph engine.
//!
//! Permissions form a directed graph where an edge `a -> b` means "holding
//! `a` requires holding `b`". The crate keeps that graph acyclic, answers
//! traversal and path queries over it, and derives edges from precedence
//! rules. It ships as a library and as the `permgraph` CLI.
//!
//! - [`engine`]: pure graph algorithms over an immutable snapshot
//! - [`storage`]: the persistence seam and its in-memory/JSONL backend
//! - [`service`]: validated, audited mutations with optimistic concurrency

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod domain;
pub mod engine;
pub mod error;
pub mod id_generation;
pub mod service;
pub mod storage;

// Public CLI module (needed by binary)
pub mod cli;

// Command implementations
pub mod commands;

pub mod app;
pub mod config;
pub mod output;

pub use error::{Error, Result};

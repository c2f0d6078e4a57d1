//! Per-route request handlers, one module per resource the router composes.

pub mod admin;
pub mod apikey;
pub mod audio;
pub mod chat;
pub mod embeddings;
pub mod models;
pub mod session;

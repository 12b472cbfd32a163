//! Runs the implicit-feedback recommender of the [`implicit`] crate on online retail
//! transactions: customers buying products, where the purchased quantity is the only signal.
//!
//! [`retail`] turns a transactions export into an interaction matrix and [`config`] holds the
//! knobs of a run. The `implicit_rs` binary puts both together.

pub mod config;
pub mod retail;

//! Terminal client for a Terraform pull-request review service: kicks off
//! runs, polls their status to a final verdict, and renders the result.
//!
//! The polling core lives in [`poll`]; everything talking HTTP lives in
//! [`api`]; [`commands`] wires both into the CLI.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod history;
pub mod poll;
pub mod render;
pub mod shutdown;

//! Livro-razão de estoque e motor de reservas.
//!
//! Saldos por (item, variante?) mantidos em sincronia com um diário somente
//! inserção, com reservas linearizáveis por chave sobre PostgreSQL.

pub mod common;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

pub use common::error::AppError;
pub use config::{AppState, LedgerPolicy, Settings};

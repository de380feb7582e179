//! Core library for EDV.
//!
//! Contains the vault collection (the business rules for creating vaults and
//! storing write-once documents), the document model, and the domain error
//! taxonomy. This crate depends on `edv-storage` for the provider and store
//! traits and knows nothing about any specific backend or about HTTP.

pub mod document;
pub mod error;
mod lock;
pub mod vault;

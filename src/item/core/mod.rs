//! Core repository types shared by every item kind.

pub mod error;
pub mod filter;
pub mod repository;

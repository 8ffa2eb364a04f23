//! Grony Core
//!
//! Core types and abstractions shared by the grony scheduler, control server,
//! client and CLI.
//!
//! This crate contains:
//! - Domain types: repositories, actions and scheduled runs
//! - Cron expressions: parsing and next-run computation
//! - Registry: the file-backed store both units share
//! - DTOs: the control-plane response body

pub mod cron;
pub mod domain;
pub mod dto;
pub mod error;
pub mod ini;
pub mod paths;
pub mod registry;

pub use error::{ConfigError, RegistryError};

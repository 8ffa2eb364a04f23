//! Data Transfer Objects for control-plane communication
//!
//! DTOs exchanged between the control server and its clients.

pub mod command;

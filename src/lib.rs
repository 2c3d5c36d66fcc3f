//! Desired-state reconciliation for Windows Server infrastructure objects.
//!
//! Declares DNS zones, DHCP scopes and leases, Active Directory OUs, Group
//! Policy objects and winget packages in a TOML manifest, then converges each
//! object with the smallest sequence of operations the platform allows.
//!
//! The public API is organised into these layers:
//!
//! - **[`model`]**: identities, attribute values, desired and current state
//! - **[`schema`]**: typed manifest records and recognized-options tables per kind
//! - **[`config`]**: manifest loading and non-fatal validation
//! - **[`engine`]**: diff, transition policy, planner, execution adapter, reporter
//! - **[`surface`]**: where current state comes from and operations go to
//! - **[`commands`]**: top-level subcommand orchestration (`plan`, `apply`, `info`, `schema`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod logging;
pub mod model;
pub mod schema;
pub mod surface;

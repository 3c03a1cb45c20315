//! `ringctl`: an operator CLI for inspecting and driving a placement ring.
//!
//! Every invocation loads a JSON topology file, replays it into an
//! in-process `Ring`, performs one command, and prints the result. There is
//! no daemon: mutating commands (`add-node`, `remove-node`) persist the
//! updated topology back to the same file.

pub mod commands;
pub mod config;

pub use commands::{execute, CommandResult};
pub use config::{CliConfig, Command, NodeEntry, TopologyFile};

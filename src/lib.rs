//! Control Tower: a live task-tracking dashboard for AI-assisted development.
//!
//! Agents and people create and update tasks through the MCP tool server,
//! the HTTP API or the CLI. Every entry point goes through
//! [`service::TaskService`], which fronts the file store in
//! `control_tower_core`. Browsers follow along over a WebSocket that receives
//! the full task list whenever the backing file changes, whoever wrote it.

pub mod api;
pub mod config;
pub mod error;
pub mod live;
pub mod mcp;
pub mod service;

//! # Arcade Session Server Library
//!
//! This library provides the authoritative session engine for the multiplayer
//! arcade. It owns the canonical state of every running game, applies player
//! actions exactly once, drives the typing-race timers, and fans events out to
//! every participant of a session.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! Every running game lives in the [`registry`] as a single `SessionState`.
//! The rule engines in the `shared` crate decide what is legal; this crate
//! decides when and in which order transitions are applied. Clients never
//! mutate state directly, they only submit actions.
//!
//! ### Serialized Transitions
//! All transitions of one session run one at a time through the registry's
//! exclusive-access path, whether they come from a player or a timer.
//! Different sessions never wait on each other.
//!
//! ### Event Fan-Out
//! Accepted transitions produce events which are published to every
//! subscriber of the session through the [`broadcast`] bus. Rejections are
//! only ever returned to the caller that caused them.
//!
//! ## Module Organization
//!
//! ### Registry (`registry`)
//! Per-session locking on top of a map of live sessions, with atomic swap of
//! the state after a successful transition.
//!
//! ### Engine (`engine`)
//! Player actions, forfeits, race countdown and timeout, state queries and
//! eviction of finished sessions after their grace period.
//!
//! ### Sinks (`sink`)
//! Queued, best-effort delivery of action history and terminal snapshots.
//! A failing store is logged and never fails a game.
//!
//! ### Network (`network`)
//! UDP front end: decodes client packets, dispatches each to its own task
//! and forwards session events to joined clients.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::EngineConfig;
//! use server::engine::GameEngine;
//! use server::network::Server;
//! use server::sink::{LogStore, SideChannel};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sinks, _writer) = SideChannel::spawn(Arc::new(LogStore));
//!     let engine = GameEngine::new(EngineConfig::default(), sinks);
//!
//!     // Serves until the process is stopped
//!     let server = Server::new("127.0.0.1:8080", engine).await?;
//!     server.run().await;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod network;
pub mod registry;
pub mod sink;
pub mod utils;

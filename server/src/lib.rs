//! # Trade Wars Server Library
//!
//! This library provides the authoritative server for a multiplayer
//! space-trading game. Players fly between the sectors of a grid-shaped
//! galaxy, trade at trading posts whose profitability wears down with use,
//! and spend their earnings on better ships and equipment. The server owns the
//! only copy of the world; clients see it through the events it broadcasts.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative World State
//! Every rule is checked here: energy costs, adjacency, trading-post presence,
//! credits and upgrade limits. A request that fails any check is answered
//! with an `error` event for the requester and changes nothing.
//!
//! ### Economy
//! Trading posts pay out `base profit x efficiency`. Each trade decays the
//! efficiency and it regenerates linearly over game time. Player energy
//! regenerates the same lazy way: it is recomputed whenever it is read
//! instead of being ticked.
//!
//! ### Event Fan-out
//! Each request produces addressed messages: to the requester, to everyone,
//! to everyone else, or to the other players in the same sector.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Event Loop
//! Connection tasks only decode and encode. One loop owns the
//! [`session::GameSession`] and applies network events one at a time, so no
//! locking is needed around the world and each request is atomic.
//!
//! ### WebSocket Transport
//! Clients connect over WebSocket. Text frames carry JSON and binary frames
//! carry bincode; a client picks its outbound codec with `?codec=bincode` at
//! handshake.
//!
//! ### Injected Time
//! All timestamps are game time from a [`clock::Clock`]. The system clock can
//! be accelerated; tests use a manual clock.
//!
//! ## Module Organization
//!
//! - `galaxy`: grid generation and sector numbering (routes over the grid
//!   come from `shared::pathfinding`)
//! - `economy`: catalogs, trading-post placement, decay and payouts
//! - `energy`: player energy regeneration and action costs
//! - `world`: the sector and player registry
//! - `session`: request validation and state transitions
//! - `session_log`: structured session events
//! - `client_manager`: open connections and message delivery
//! - `network`: sockets, connection tasks and the main loop
//! - `config`, `clock`, `error`: supporting types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut config = GameConfig::default();
//!     config.universe.seed = Some(42);
//!
//!     // Generates the galaxy, then serves ws://127.0.0.1:3000/
//!     let mut server = Server::new("127.0.0.1:3000", config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod clock;
pub mod config;
pub mod economy;
pub mod energy;
pub mod error;
pub mod galaxy;
pub mod network;
pub mod session;
pub mod session_log;
pub mod world;

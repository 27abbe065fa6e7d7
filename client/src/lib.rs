//! # Trade Wars Client Library
//!
//! A headless client for the trading server. It speaks the same WebSocket
//! protocol a browser client does and keeps a local copy of whatever the
//! server reports, which makes it useful for smoke tests, scripted sessions
//! and end-to-end tests.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! `ClientWorld`, the local cache:
//! - Applies `playerJoined`, `playerUpdate`, trade and upgrade results
//! - Tracks the last server error and the profit earned so far
//! - Plans routes over the cached sector map and turns them into one
//!   `moveTo` request per hop
//!
//! ### Network Module (`network`)
//! - `Connection`: WebSocket connect, send a request, receive an event, with
//!   either JSON or bincode frames
//! - `Client`: a connection plus its cache, with `join`, `travel_to` and
//!   `trade` helpers that wait for the server's answer
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::WireCodec;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut client = Client::connect("ws://127.0.0.1:3000", WireCodec::Json).await?;
//!     client.join().await?;
//!
//!     // The server moves one hop per request; travel_to keeps asking
//!     client.travel_to(42).await?;
//!     if client.world.trading_post_here() {
//!         client.trade().await?;
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Philosophy
//!
//! The server is the only source of truth. The client never predicts the
//! outcome of a request; it sends it and waits for the matching event.

pub mod game;
pub mod network;

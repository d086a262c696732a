//! Board back-end: boards, swim lanes and cards behind a JSON API.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │  store   │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │  validate.rs (body → payload structs)  │
//!                       │         v                                        │
//!                       │  db.rs  (BoardDb: CRUD, move, seed, verify)      │
//!                       │         │  ordering.rs (rank bookkeeping)        │
//!                       │         v                                        │
//!                       │  proxy.rs  (SqlProxy: HttpSqlProxy/SqliteProxy)  │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module      | Responsibility                                            |
//! |-------------|-----------------------------------------------------------|
//! | `models`    | Public `Board`/`Lane`/`Card`, request payloads, row types |
//! | `ordering`  | `Ranked` trait, reorder/transfer/renumber helpers         |
//! | `validate`  | Field-level checks producing `BoardError::Validation`     |
//!
//! ## Typical Request Flow (move card)
//!
//! 1. `PUT /api/cards/{uuid}/move` → `api::move_card()`
//! 2. `validate::move_card()` checks `lane_uuid` and `position`.
//! 3. `BoardDb::move_card()` resolves both uuids, loads the source and
//!    destination lanes, reorders them with `ordering` and builds one
//!    statement per changed position.
//! 4. The batch goes through `SqlProxy::execute_all()` (a transaction on
//!    SQLite, sequential requests on the HTTP proxy).

pub mod api;
pub mod db;
pub mod models;
pub mod ordering;
pub mod proxy;
pub mod server;
pub mod validate;

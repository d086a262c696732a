//! Client side of the board: an HTTP API client, drag-end planning and the
//! `BoardStore` application state.

pub mod api;
pub mod reorder;
pub mod store;

pub use api::{ApiClient, BoardApi};
pub use store::{BoardState, BoardStore, Mutation, MutationState};

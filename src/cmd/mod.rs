//! CLI command implementations.
//!
//! | Module     | Commands handled   |
//! |------------|--------------------|
//! | `serve`    | `Serve`, `Init`    |
//! | `inspect`  | `Verify`, `Show`   |

pub mod inspect;
pub mod serve;

pub use inspect::{cmd_show, cmd_verify};
pub use serve::{cmd_init, cmd_serve};

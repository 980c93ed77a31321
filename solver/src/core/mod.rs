//! Pure, deterministic pipeline logic: state model, routing, extraction, and
//! the checkpoint log. No I/O lives here.

pub mod checkpoint;
pub mod extract;
pub mod router;
pub mod state;
pub mod types;

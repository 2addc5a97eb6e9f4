//! Umbrella crate for the IRKE town builder.
//!
//! This crate is intentionally small: it re-exports the engine and protocol crates
//! so downstream code can depend on a single crate name (`irke_town`).

pub use irke_town_engine as engine;
pub use irke_town_protocol as protocol;

//! Spatial core of the town builder: isometric transform, occupancy, A* road
//! routing, port resolution and the connection lifecycle, plus the SQLite-backed
//! save store.
//!
//! The spatial modules are stateless functions over building/connection slices.
//! [`Town`] owns the live collections and is the only place that mutates them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod catalog;
pub mod error;
pub mod hit;
pub mod iso;
pub mod occupancy;
pub mod ports;
pub mod routing;
pub mod store;
pub mod town;

#[cfg(test)]
mod tests;

pub use catalog::{template, BuildingTemplate};
pub use error::{ConnectError, PlacementError};
pub use iso::{grid_to_screen, is_valid_grid_position, screen_to_grid, ScreenPoint};
pub use occupancy::{footprint, is_position_occupied, Rect};
pub use ports::{PortKind, Side};
pub use routing::{expand_path, simplify_path, IntoCell, WalkGrid};
pub use store::TownStore;
pub use town::Town;

pub use irke_town_protocol as protocol;

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

pub(crate) fn new_id(prefix: &str) -> String {
    let c = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{c}", now_ms())
}

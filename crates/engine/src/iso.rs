//! 2:1 isometric projection between grid cells and screen pixels.

use irke_town_protocol::{GridConfig, GridPoint};
use serde::{Deserialize, Serialize};

/// Absorbs float error when a point lands exactly on a cell origin.
const SNAP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Screen position of a grid coordinate's origin. Total over any real input.
pub fn grid_to_screen(config: &GridConfig, grid_x: f64, grid_y: f64) -> ScreenPoint {
    ScreenPoint {
        x: (grid_x - grid_y) * (config.cell_width / 2.0),
        y: (grid_x + grid_y) * (config.cell_height / 2.0),
    }
}

pub fn cell_to_screen(config: &GridConfig, cell: GridPoint) -> ScreenPoint {
    grid_to_screen(config, f64::from(cell.x), f64::from(cell.y))
}

/// Inverse of [`grid_to_screen`], floored to the containing cell.
pub fn screen_to_grid(config: &GridConfig, screen_x: f64, screen_y: f64) -> GridPoint {
    let u = screen_x / (config.cell_width / 2.0);
    let v = screen_y / (config.cell_height / 2.0);
    let x = (u + v) / 2.0;
    let y = (v - u) / 2.0;
    GridPoint::new(
        (x + SNAP_EPSILON).floor() as i32,
        (y + SNAP_EPSILON).floor() as i32,
    )
}

pub fn is_valid_grid_position(config: &GridConfig, x: i32, y: i32) -> bool {
    x >= 0 && x < config.width && y >= 0 && y < config.height
}

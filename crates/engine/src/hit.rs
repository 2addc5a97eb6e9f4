//! Pure hit-testing predicates for pointer picking.

use irke_town_protocol::{Building, Connection, GridConfig, GridPoint};

use crate::iso::{cell_to_screen, ScreenPoint};
use crate::occupancy::footprint;

/// Pointer tolerance, in pixels, on each side of a road's center line.
pub const ROAD_HIT_HALF_WIDTH: f64 = 15.0;

pub fn building_at(buildings: &[Building], cell: GridPoint) -> Option<&Building> {
    buildings.iter().find(|b| footprint(b).contains(cell))
}

fn distance_to_segment(p: ScreenPoint, a: ScreenPoint, b: ScreenPoint) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(ScreenPoint::new(a.x + t * dx, a.y + t * dy))
}

/// True if `point` lies within `half_width` pixels of the projected path.
/// Paths with fewer than two cells are never hit.
pub fn connection_hit(
    config: &GridConfig,
    path: &[GridPoint],
    point: ScreenPoint,
    half_width: f64,
) -> bool {
    path.windows(2).any(|w| {
        let a = cell_to_screen(config, w[0]);
        let b = cell_to_screen(config, w[1]);
        distance_to_segment(point, a, b) <= half_width
    })
}

pub fn connection_at<'a>(
    config: &GridConfig,
    connections: &'a [Connection],
    point: ScreenPoint,
) -> Option<&'a Connection> {
    connections
        .iter()
        .find(|c| connection_hit(config, &c.path, point, ROAD_HIT_HALF_WIDTH))
}

//! Connection endpoints around a building's footprint.
//!
//! A port is the cell just outside the effective footprint, at the midpoint
//! (`floor(dim / 2)`) of one side.

use irke_town_protocol::{Building, GridPoint, Rotation};

use crate::catalog::template;
use crate::occupancy::footprint;
use crate::routing::WalkGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    North,
    East,
    South,
    West,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Input,
    Output,
}

impl Side {
    /// Output faces south at 0° and turns with the building.
    pub fn output(rotation: Rotation) -> Self {
        match rotation {
            Rotation::Deg0 => Self::South,
            Rotation::Deg90 => Self::West,
            Rotation::Deg180 => Self::North,
            Rotation::Deg270 => Self::East,
        }
    }

    pub fn input(rotation: Rotation) -> Self {
        Self::output(rotation).opposite()
    }

    pub fn of(kind: PortKind, rotation: Rotation) -> Self {
        match kind {
            PortKind::Input => Self::input(rotation),
            PortKind::Output => Self::output(rotation),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }
}

/// Cell just outside the midpoint of `side`.
pub fn side_cell(building: &Building, side: Side) -> GridPoint {
    let r = footprint(building);
    let mid_x = r.x + r.width / 2;
    let mid_y = r.y + r.height / 2;
    match side {
        Side::North => GridPoint::new(mid_x, r.y - 1),
        Side::South => GridPoint::new(mid_x, r.bottom()),
        Side::West => GridPoint::new(r.x - 1, mid_y),
        Side::East => GridPoint::new(r.right(), mid_y),
    }
}

pub fn port_point(building: &Building, kind: PortKind) -> GridPoint {
    side_cell(building, Side::of(kind, building.rotation))
}

/// Port cell of the building with `building_id`, ignoring whether its type
/// declares that port.
pub fn find_building_port_point(
    buildings: &[Building],
    building_id: &str,
    kind: PortKind,
) -> Option<GridPoint> {
    buildings
        .iter()
        .find(|b| b.id == building_id)
        .map(|b| port_point(b, kind))
}

/// Free side-midpoint cell nearest (Manhattan) to `target`; ties keep the
/// first of north, south, west, east.
pub fn edge_point(walk: &WalkGrid, building: &Building, target: GridPoint) -> Option<GridPoint> {
    [Side::North, Side::South, Side::West, Side::East]
        .into_iter()
        .map(|side| side_cell(building, side))
        .filter(|p| walk.is_walkable(*p))
        .fold(None, |best: Option<GridPoint>, p| match best {
            Some(b) if b.manhattan(target) <= p.manhattan(target) => Some(b),
            _ => Some(p),
        })
}

pub fn find_building_edge_point(
    walk: &WalkGrid,
    buildings: &[Building],
    building_id: &str,
    target: GridPoint,
) -> Option<GridPoint> {
    let building = buildings.iter().find(|b| b.id == building_id)?;
    edge_point(walk, building, target)
}

/// Declared port when the building's type has one on that side, else the edge
/// point nearest to `toward`.
pub fn resolve_endpoint(
    walk: &WalkGrid,
    building: &Building,
    kind: PortKind,
    toward: GridPoint,
) -> Option<GridPoint> {
    let t = template(building.kind);
    let declared = match kind {
        PortKind::Input => t.has_input_port,
        PortKind::Output => t.has_output_port,
    };
    if declared {
        Some(port_point(building, kind))
    } else {
        edge_point(walk, building, toward)
    }
}

use irke_town_protocol::{Building, GridConfig, GridPoint};

/// Half-open cell rectangle `[x, x + width) × [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Saturates instead of wrapping for rectangles near `i32::MAX`.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Strict AABB test: rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.right() <= other.x
            || self.x >= other.right()
            || self.bottom() <= other.y
            || self.y >= other.bottom())
    }

    pub fn contains(&self, p: GridPoint) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn fits_within(&self, config: &GridConfig) -> bool {
        self.width > 0
            && self.height > 0
            && self.x >= 0
            && self.y >= 0
            && i64::from(self.x) + i64::from(self.width) <= i64::from(config.width)
            && i64::from(self.y) + i64::from(self.height) <= i64::from(config.height)
    }

    pub fn cells(&self) -> impl Iterator<Item = GridPoint> + '_ {
        (self.y..self.bottom())
            .flat_map(move |y| (self.x..self.right()).map(move |x| GridPoint::new(x, y)))
    }
}

/// Effective (post-rotation) footprint of a building.
pub fn footprint(building: &Building) -> Rect {
    let (w, h) = building.effective_size();
    Rect::new(building.grid_x, building.grid_y, w, h)
}

/// First building other than `exclude_id` whose footprint overlaps `rect`.
pub fn occupant<'a>(
    buildings: &'a [Building],
    rect: Rect,
    exclude_id: Option<&str>,
) -> Option<&'a Building> {
    buildings
        .iter()
        .filter(|b| Some(b.id.as_str()) != exclude_id)
        .find(|b| footprint(b).overlaps(&rect))
}

pub fn is_position_occupied(buildings: &[Building], rect: Rect, exclude_id: Option<&str>) -> bool {
    occupant(buildings, rect, exclude_id).is_some()
}

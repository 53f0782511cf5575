//! Cube-coordinate hex grid.
//!
//! Cells are addressed by `(q, r, s)` with `q + r + s == 0`. The grid is an
//! immutable set of such cells generated from a [`GridLayout`]; every query
//! that names a cell outside the set simply yields nothing.
//!
//! Line drawing interpolates in fixed-point so the same inputs produce the
//! same cells on every platform.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::Fixed;

/// A hex cell in cube coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CubeCell {
    /// Column axis.
    pub q: i32,
    /// Row axis.
    pub r: i32,
    /// Derived axis, always `-q - r`.
    pub s: i32,
}

impl CubeCell {
    /// The origin cell.
    pub const ORIGIN: Self = Self { q: 0, r: 0, s: 0 };

    /// Create a cell from all three coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `q + r + s != 0`.
    #[must_use]
    pub fn new(q: i32, r: i32, s: i32) -> Self {
        assert_eq!(q + r + s, 0, "cube coordinates must sum to zero");
        Self { q, r, s }
    }

    /// Create a cell from axial coordinates, deriving `s`.
    #[must_use]
    pub const fn axial(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    /// Plain hex distance between two cells.
    #[must_use]
    pub fn hex_distance(self, other: Self) -> u32 {
        let d = self - other;
        (d.q.unsigned_abs() + d.r.unsigned_abs() + d.s.unsigned_abs()) / 2
    }

    /// Hex distance plus one, counting the cell the measurement starts from.
    ///
    /// Weapon reach is measured with [`hex_distance`](Self::hex_distance),
    /// matching the radius of weapon zones.
    #[must_use]
    pub fn range_distance(self, other: Self) -> u32 {
        self.hex_distance(other) + 1
    }

    /// Step one cell in `direction`.
    #[must_use]
    pub fn step(self, direction: HexDirection) -> Self {
        self + direction.offset()
    }

    /// Round fractional cube coordinates to the nearest cell.
    ///
    /// The axis with the largest rounding error is recomputed from the
    /// other two to keep the zero-sum constraint.
    #[must_use]
    pub fn round(q: Fixed, r: Fixed, s: Fixed) -> Self {
        let mut rq = q.round();
        let mut rr = r.round();
        let rs = s.round();

        let dq = (rq - q).abs();
        let dr = (rr - r).abs();
        let ds = (rs - s).abs();

        if dq > dr && dq > ds {
            rq = -rr - rs;
        } else if dr > ds {
            rr = -rq - rs;
        }

        Self::axial(rq.to_num::<i32>(), rr.to_num::<i32>())
    }
}

impl fmt::Display for CubeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.q, self.r, self.s)
    }
}

impl Add for CubeCell {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            q: self.q + rhs.q,
            r: self.r + rhs.r,
            s: self.s + rhs.s,
        }
    }
}

impl Sub for CubeCell {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            q: self.q - rhs.q,
            r: self.r - rhs.r,
            s: self.s - rhs.s,
        }
    }
}

/// The six unit directions on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HexDirection {
    /// `(+1, 0, -1)`
    East,
    /// `(+1, -1, 0)`
    NorthEast,
    /// `(0, -1, +1)`
    NorthWest,
    /// `(-1, 0, +1)`
    West,
    /// `(-1, +1, 0)`
    SouthWest,
    /// `(0, +1, -1)`
    SouthEast,
}

impl HexDirection {
    /// All directions in neighbour order.
    pub const ALL: [Self; 6] = [
        Self::East,
        Self::NorthEast,
        Self::NorthWest,
        Self::West,
        Self::SouthWest,
        Self::SouthEast,
    ];

    /// Unit offset for this direction.
    #[must_use]
    pub const fn offset(self) -> CubeCell {
        match self {
            Self::East => CubeCell::axial(1, 0),
            Self::NorthEast => CubeCell::axial(1, -1),
            Self::NorthWest => CubeCell::axial(0, -1),
            Self::West => CubeCell::axial(-1, 0),
            Self::SouthWest => CubeCell::axial(-1, 1),
            Self::SouthEast => CubeCell::axial(0, 1),
        }
    }

    /// The direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::East => Self::West,
            Self::NorthEast => Self::SouthWest,
            Self::NorthWest => Self::SouthEast,
            Self::West => Self::East,
            Self::SouthWest => Self::NorthEast,
            Self::SouthEast => Self::NorthWest,
        }
    }

    /// Direction of a single step from `from` to `to`, if they are adjacent.
    #[must_use]
    pub fn between(from: CubeCell, to: CubeCell) -> Option<Self> {
        let delta = to - from;
        Self::ALL.into_iter().find(|dir| dir.offset() == delta)
    }
}

/// How the grid's cells are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridLayout {
    /// Hexagon of all cells within `radius` of the origin.
    Radius(i32),
    /// Offset-row rectangle centred on the origin.
    Rect {
        /// Columns.
        width: i32,
        /// Rows.
        height: i32,
    },
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::Rect {
            width: 30,
            height: 25,
        }
    }
}

/// Immutable set of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexGrid {
    layout: GridLayout,
    cells: BTreeSet<CubeCell>,
}

impl HexGrid {
    /// Generate a grid for `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfiguration`] when any dimension is not
    /// positive.
    pub fn generate(layout: GridLayout) -> Result<Self> {
        let cells = match layout {
            GridLayout::Radius(radius) => {
                if radius <= 0 {
                    return Err(GameError::InvalidConfiguration(format!(
                        "grid radius must be positive, got {radius}"
                    )));
                }
                let mut cells = BTreeSet::new();
                for q in -radius..=radius {
                    for r in (-radius).max(-q - radius)..=radius.min(-q + radius) {
                        cells.insert(CubeCell::axial(q, r));
                    }
                }
                cells
            }
            GridLayout::Rect { width, height } => {
                if width <= 0 || height <= 0 {
                    return Err(GameError::InvalidConfiguration(format!(
                        "grid dimensions must be positive, got {width}x{height}"
                    )));
                }
                let mut cells = BTreeSet::new();
                for row in -(height / 2)..height - height / 2 {
                    for col in -(width / 2)..width - width / 2 {
                        let q = col - row.div_euclid(2);
                        cells.insert(CubeCell::axial(q, row));
                    }
                }
                cells
            }
        };

        tracing::debug!(?layout, cells = cells.len(), "Generated hex grid");
        Ok(Self { layout, cells })
    }

    /// Hexagonal grid of the given radius.
    pub fn radius(radius: i32) -> Result<Self> {
        Self::generate(GridLayout::Radius(radius))
    }

    /// Rectangular grid of `width` columns and `height` rows.
    pub fn rect(width: i32, height: i32) -> Result<Self> {
        Self::generate(GridLayout::Rect { width, height })
    }

    /// Replace every cell with a freshly generated layout.
    ///
    /// On error the grid is left untouched.
    pub fn regenerate(&mut self, layout: GridLayout) -> Result<()> {
        *self = Self::generate(layout)?;
        Ok(())
    }

    /// Layout this grid was generated from.
    #[must_use]
    pub const fn layout(&self) -> GridLayout {
        self.layout
    }

    /// Whether the cell is part of the grid.
    #[must_use]
    pub fn contains(&self, cell: CubeCell) -> bool {
        self.cells.contains(&cell)
    }

    /// Look up a cell by coordinates.
    #[must_use]
    pub fn get(&self, q: i32, r: i32, s: i32) -> Option<CubeCell> {
        if q + r + s != 0 {
            return None;
        }
        let cell = CubeCell::axial(q, r);
        self.contains(cell).then_some(cell)
    }

    /// All cells in coordinate order.
    pub fn cells(&self) -> impl Iterator<Item = CubeCell> + '_ {
        self.cells.iter().copied()
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Existing neighbours of `cell`.
    #[must_use]
    pub fn neighbors(&self, cell: CubeCell) -> Vec<CubeCell> {
        HexDirection::ALL
            .iter()
            .map(|dir| cell.step(*dir))
            .filter(|n| self.contains(*n))
            .collect()
    }

    /// Existing cells within `radius` of `center`, center included.
    #[must_use]
    pub fn cells_in_radius(&self, center: CubeCell, radius: u32) -> Vec<CubeCell> {
        let radius = radius as i32;
        let mut result = Vec::new();
        for dq in -radius..=radius {
            for dr in (-radius).max(-dq - radius)..=radius.min(-dq + radius) {
                let cell = center + CubeCell::axial(dq, dr);
                if self.contains(cell) {
                    result.push(cell);
                }
            }
        }
        result
    }

    /// Cells on the straight line from `start` to `end`, both included.
    ///
    /// Consecutive duplicates are collapsed and cells that are not on the
    /// grid are dropped.
    #[must_use]
    pub fn line(&self, start: CubeCell, end: CubeCell) -> Vec<CubeCell> {
        let n = start.hex_distance(end) as i32;
        let mut result: Vec<CubeCell> = Vec::with_capacity(n as usize + 1);

        for i in 0..=n {
            let cell = if n == 0 {
                start
            } else {
                let lerp = |a: i32, b: i32| Fixed::from_num(a * (n - i) + b * i) / Fixed::from_num(n);
                CubeCell::round(lerp(start.q, end.q), lerp(start.r, end.r), lerp(start.s, end.s))
            };

            if result.last() == Some(&cell) {
                continue;
            }
            result.push(cell);
        }

        result.retain(|cell| self.contains(*cell));
        result
    }

    /// Shortest path over unit-cost adjacency, start and end included.
    #[must_use]
    pub fn shortest_path(&self, start: CubeCell, end: CubeCell) -> Option<Vec<CubeCell>> {
        self.shortest_path_with(start, end, |_| true)
    }

    /// Shortest path that only enters cells accepted by `passable`.
    ///
    /// The start cell is never tested. Returns `None` if either endpoint is
    /// off the grid or the goal cannot be reached.
    #[must_use]
    pub fn shortest_path_with<F>(&self, start: CubeCell, end: CubeCell, passable: F) -> Option<Vec<CubeCell>>
    where
        F: Fn(CubeCell) -> bool,
    {
        if !self.contains(start) || !self.contains(end) || !passable(end) {
            return None;
        }
        if start == end {
            return Some(vec![start]);
        }

        let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
        let mut came_from: BTreeMap<CubeCell, CubeCell> = BTreeMap::new();
        let mut g_score: BTreeMap<CubeCell, u32> = BTreeMap::new();

        g_score.insert(start, 0);
        open_set.push(AStarNode {
            cell: start,
            f_score: start.hex_distance(end),
            g_score: 0,
        });

        while let Some(current) = open_set.pop() {
            if current.cell == end {
                return Some(reconstruct_path(&came_from, end));
            }

            let current_g = g_score.get(&current.cell).copied().unwrap_or(u32::MAX);
            if current.g_score > current_g {
                // stale heap entry
                continue;
            }

            for neighbor in self.neighbors(current.cell) {
                if !passable(neighbor) {
                    continue;
                }

                let tentative_g = current_g + 1;
                let neighbor_g = g_score.get(&neighbor).copied().unwrap_or(u32::MAX);

                if tentative_g < neighbor_g {
                    came_from.insert(neighbor, current.cell);
                    g_score.insert(neighbor, tentative_g);
                    open_set.push(AStarNode {
                        cell: neighbor,
                        f_score: tentative_g + neighbor.hex_distance(end),
                        g_score: tentative_g,
                    });
                }
            }
        }

        None
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AStarNode {
    cell: CubeCell,
    f_score: u32,
    g_score: u32,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: lower f_score wins, then lower cell.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.cell.cmp(&self.cell),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn reconstruct_path(came_from: &BTreeMap<CubeCell, CubeCell>, goal: CubeCell) -> Vec<CubeCell> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}

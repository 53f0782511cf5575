//! Move and weapon zones, and per-cell highlight classification.
//!
//! Zones are transient: they are rebuilt whenever the selection changes
//! and never carried across turns. Classification is a pure function of
//! the zone, the hovered cell and the static markers.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::entities::{Ship, WeaponKind};
use crate::grid::{CubeCell, HexGrid};
use crate::placement::{fits_at_candidate, footprint_at};

/// What a zone is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Candidate destinations.
    Move,
    /// Candidate targets for a weapon of this kind.
    Weapon(WeaponKind),
}

/// A materialized set of selectable cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Head cell the zone was computed from.
    pub center: CubeCell,
    /// Radius used.
    pub radius: u32,
    /// Move or weapon.
    pub kind: ZoneKind,
    /// Member cells.
    pub cells: BTreeSet<CubeCell>,
}

impl Zone {
    /// Whether `cell` is a member.
    #[must_use]
    pub fn contains(&self, cell: CubeCell) -> bool {
        self.cells.contains(&cell)
    }

    /// Number of member cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the zone has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells present in both zones, in coordinate order.
    #[must_use]
    pub fn intersection(&self, other: &Zone) -> Vec<CubeCell> {
        self.cells.intersection(&other.cells).copied().collect()
    }
}

fn radius_union(grid: &HexGrid, origins: &[CubeCell], radius: u32) -> BTreeSet<CubeCell> {
    let mut cells = BTreeSet::new();
    for origin in origins {
        if grid.contains(*origin) {
            cells.insert(*origin);
        }
        cells.extend(grid.cells_in_radius(*origin, radius));
    }
    cells
}

/// Cells the ship may move its head to this turn.
///
/// Obstacles are excluded. For multi-cell ships every candidate must also
/// host the translated footprint.
#[must_use]
pub fn move_zone(board: &Board, ship: &Ship) -> Zone {
    let occupied = ship.occupied(board.grid());
    let mut cells = radius_union(board.grid(), &occupied, ship.move_distance);
    cells.retain(|cell| !board.has_obstacle(*cell));

    if ship.shape.size() > 1 {
        cells.retain(|cell| fits_at_candidate(board, ship, *cell));
    }

    Zone {
        center: ship.head,
        radius: ship.move_distance,
        kind: ZoneKind::Move,
        cells,
    }
}

/// Cells a weapon of `kind` and `radius` can target from `origins`.
///
/// Obstacles are valid targets.
#[must_use]
pub fn weapon_zone(grid: &HexGrid, origins: &[CubeCell], radius: u32, kind: WeaponKind) -> Zone {
    Zone {
        center: origins.first().copied().unwrap_or(CubeCell::ORIGIN),
        radius,
        kind: ZoneKind::Weapon(kind),
        cells: radius_union(grid, origins, radius),
    }
}

/// Cells the ship will occupy once its pending move executes.
///
/// Falls back to the current footprint when no move is pending or the
/// ship cannot land on its destination.
#[must_use]
pub fn planned_origin(board: &Board, ship: &Ship) -> Vec<CubeCell> {
    match ship.move_cell {
        Some(dest) => footprint_at(board, ship, dest),
        None => ship.occupied(board.grid()),
    }
}

/// Line-of-sight cells for a beam aimed at `hovered`.
///
/// Empty unless `zone` is a beam zone containing `hovered`.
#[must_use]
pub fn beam_line(grid: &HexGrid, zone: &Zone, hovered: CubeCell) -> Vec<CubeCell> {
    if zone.kind != ZoneKind::Weapon(WeaponKind::Beam) || !zone.contains(hovered) {
        return Vec::new();
    }
    grid.line(zone.center, hovered)
}

/// Display class of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Highlight {
    /// Nothing to show.
    #[default]
    Default,
    /// Member of the active zone.
    Zone,
    /// Hovered move candidate.
    MoveHover,
    /// Hovered weapon target.
    WeaponHover,
    /// On the beam line toward the hovered target.
    WeaponHoverLine,
    /// Committed move destination.
    MoveActive,
    /// Committed weapon target.
    WeaponActive,
}

/// Committed targeting markers that persist until cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
    /// Committed destinations.
    pub move_active: BTreeSet<CubeCell>,
    /// Committed weapon targets.
    pub weapon_active: BTreeSet<CubeCell>,
}

impl Markers {
    /// Drop every marker.
    pub fn clear(&mut self) {
        self.move_active.clear();
        self.weapon_active.clear();
    }
}

/// Non-default highlight per cell; absent cells are [`Highlight::Default`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightMap {
    cells: BTreeMap<CubeCell, Highlight>,
}

impl HighlightMap {
    /// Highlight of `cell`.
    #[must_use]
    pub fn get(&self, cell: CubeCell) -> Highlight {
        self.cells.get(&cell).copied().unwrap_or_default()
    }

    /// Cells with a non-default highlight.
    pub fn iter(&self) -> impl Iterator<Item = (CubeCell, Highlight)> + '_ {
        self.cells.iter().map(|(cell, h)| (*cell, *h))
    }

    /// Number of non-default cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether every cell is default.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Classify every grid cell for display.
///
/// Priority: active markers, then the hovered cell, then the beam line,
/// then zone membership.
#[must_use]
pub fn classify(
    grid: &HexGrid,
    zone: Option<&Zone>,
    hover: Option<CubeCell>,
    markers: &Markers,
) -> HighlightMap {
    let mut cells = BTreeMap::new();

    if let Some(zone) = zone {
        for cell in &zone.cells {
            cells.insert(*cell, Highlight::Zone);
        }

        if let Some(hovered) = hover.filter(|c| zone.contains(*c)) {
            for cell in beam_line(grid, zone, hovered) {
                cells.insert(cell, Highlight::WeaponHoverLine);
            }
            let hover_class = match zone.kind {
                ZoneKind::Move => Highlight::MoveHover,
                ZoneKind::Weapon(_) => Highlight::WeaponHover,
            };
            cells.insert(hovered, hover_class);
        }
    }

    for cell in &markers.move_active {
        cells.insert(*cell, Highlight::MoveActive);
    }
    for cell in &markers.weapon_active {
        cells.insert(*cell, Highlight::WeaponActive);
    }

    cells.retain(|cell, _| grid.contains(*cell));
    HighlightMap { cells }
}

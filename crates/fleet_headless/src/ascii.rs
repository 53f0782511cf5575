//! ASCII board renderer for quick terminal review.
//!
//! Rows are drawn top to bottom by `r`. Each row is indented by half a
//! cell so the hexagonal layout reads correctly:
//!
//! ```text
//!  . . # . .
//! . P p . o
//!  . + + E .
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write;

use fleet_core::entities::{AsteroidSize, Behavior};
use fleet_core::grid::CubeCell;
use fleet_core::turn::Battle;
use fleet_core::zone::Highlight;

/// ASCII rendering configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Show the legend and ship list under the board.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
    /// Ship colour per side as `#rrggbb`, usually the scenario's palette.
    /// Sides missing here fall back to the built-in ANSI colours.
    pub palette: BTreeMap<Behavior, String>,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            use_color: false,
            palette: BTreeMap::new(),
        }
    }
}

impl AsciiConfig {
    /// Colour ships from `palette`.
    #[must_use]
    pub fn with_palette(mut self, palette: &BTreeMap<Behavior, String>) -> Self {
        self.palette = palette.clone();
        self
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const CYAN: &str = "\x1b[36m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const GREEN: &str = "\x1b[32m";
    pub const GRAY: &str = "\x1b[90m";
}

/// Glyph and color for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Glyph {
    ch: char,
    color: Cow<'static, str>,
}

/// 24-bit ANSI foreground for a `#rrggbb` colour.
fn truecolor(hex: &str) -> Option<String> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(format!("\x1b[38;2;{};{};{}m", channel(0)?, channel(2)?, channel(4)?))
}

/// Ship glyph: uppercase on the head, lowercase on the rest of the hull.
fn ship_glyph(behavior: Behavior, head: bool, palette: &BTreeMap<Behavior, String>) -> Glyph {
    let (ch, fallback) = match behavior {
        Behavior::Player => ('P', colors::CYAN),
        Behavior::Ally => ('A', colors::GREEN),
        Behavior::Enemy => ('E', colors::RED),
    };
    let color = palette
        .get(&behavior)
        .and_then(|hex| truecolor(hex))
        .map_or(Cow::Borrowed(fallback), Cow::Owned);
    Glyph {
        ch: if head { ch } else { ch.to_ascii_lowercase() },
        color,
    }
}

fn plain(ch: char, color: &'static str) -> Glyph {
    Glyph {
        ch,
        color: Cow::Borrowed(color),
    }
}

fn highlight_glyph(highlight: Highlight) -> Glyph {
    let (ch, color) = match highlight {
        Highlight::Default => ('.', colors::GRAY),
        Highlight::Zone => ('+', colors::YELLOW),
        Highlight::MoveHover => ('*', colors::YELLOW),
        Highlight::WeaponHover => ('x', colors::RED),
        Highlight::WeaponHoverLine => ('-', colors::RED),
        Highlight::MoveActive => ('@', colors::CYAN),
        Highlight::WeaponActive => ('X', colors::RED),
    };
    plain(ch, color)
}

/// Column of a cell in a doubled-width layout.
const fn column(cell: CubeCell) -> i32 {
    2 * cell.q + cell.r
}

/// Resolve the glyph of every cell. Entities win over highlights.
fn glyphs(battle: &Battle, config: &AsciiConfig) -> BTreeMap<CubeCell, Glyph> {
    let board = battle.board();
    let grid = board.grid();
    let highlights = battle.highlights();

    let mut out: BTreeMap<CubeCell, Glyph> = grid
        .cells()
        .map(|cell| (cell, highlight_glyph(highlights.get(cell))))
        .collect();

    for obstacle in board.obstacles() {
        out.insert(obstacle.cell, plain('#', colors::GRAY));
    }
    for asteroid in battle.asteroids().values() {
        let ch = match asteroid.size {
            AsteroidSize::Big => 'O',
            AsteroidSize::Small => 'o',
        };
        out.insert(asteroid.cell, plain(ch, colors::YELLOW));
    }
    for ship in battle.ships().values() {
        for cell in ship.occupied(grid) {
            out.insert(
                cell,
                ship_glyph(ship.behavior, cell == ship.head, &config.palette),
            );
        }
    }
    out
}

/// Render the battle as ASCII art.
#[must_use]
pub fn render_ascii(battle: &Battle, config: &AsciiConfig) -> String {
    let cells = glyphs(battle, config);
    let Some(min_col) = cells.keys().map(|c| column(*c)).min() else {
        return String::from("(empty board)\n");
    };

    let mut rows: BTreeMap<i32, BTreeMap<i32, Glyph>> = BTreeMap::new();
    for (cell, glyph) in cells {
        rows.entry(cell.r)
            .or_default()
            .insert(column(cell) - min_col, glyph);
    }

    let mut output = String::new();
    for row in rows.values() {
        let mut x = 0;
        for (&col, glyph) in row {
            while x < col {
                output.push(' ');
                x += 1;
            }
            if config.use_color {
                let _ = write!(output, "{}{}{}", glyph.color, glyph.ch, colors::RESET);
            } else {
                output.push(glyph.ch);
            }
            x += 1;
        }
        output.push('\n');
    }

    if config.show_legend {
        output.push('\n');
        output.push_str(&legend(battle, config));
    }
    output
}

fn legend(battle: &Battle, config: &AsciiConfig) -> String {
    let mut output = String::new();
    let (bold, reset) = if config.use_color {
        (colors::BOLD, colors::RESET)
    } else {
        ("", "")
    };
    let _ = writeln!(
        output,
        "{bold}Turn {}{reset}  P/A/E ship  O/o asteroid  # obstacle  + zone  @ move  X target",
        battle.turn()
    );
    for ship in battle.ships().values() {
        let _ = writeln!(
            output,
            "  [{}] {:<10} {:?} at {} hp {}/{} score {}",
            ship.id,
            ship.name,
            ship.behavior,
            ship.head,
            ship.health.current,
            ship.health.max,
            ship.score
        );
    }
    if !battle.asteroids().is_empty() {
        let _ = writeln!(output, "  {} asteroids", battle.asteroids().len());
    }
    output
}

#[cfg(test)]
mod tests {
    use fleet_core::entities::Shape;
    use fleet_test_utils::fixtures::{battle_on, radius_board, ShipBuilder};

    use super::*;

    fn bare() -> AsciiConfig {
        AsciiConfig {
            show_legend: false,
            ..AsciiConfig::default()
        }
    }

    #[test]
    fn test_render_radius_one() {
        let battle = battle_on(radius_board(1), 1);
        let art = render_ascii(&battle, &bare());
        let rows: Vec<&str> = art.lines().collect();
        assert_eq!(rows, vec![" . .", ". . .", " . ."]);
    }

    #[test]
    fn test_ships_and_obstacles_drawn() {
        let mut battle = battle_on(radius_board(2), 1);
        battle.add_obstacle(CubeCell::new(0, -2, 2)).unwrap();
        battle.add_ship(
            ShipBuilder::new(Behavior::Player)
                .shape(Shape::HorizontalL)
                .build(),
        );
        battle.add_ship(
            ShipBuilder::new(Behavior::Enemy)
                .at(CubeCell::new(0, 2, -2))
                .build(),
        );

        let art = render_ascii(&battle, &bare());
        assert_eq!(art.matches('P').count(), 1);
        assert_eq!(art.matches('p').count(), 1);
        assert_eq!(art.matches('E').count(), 1);
        assert_eq!(art.matches('#').count(), 1);
    }

    #[test]
    fn test_zone_highlight_drawn() {
        let mut battle = battle_on(radius_board(3), 1);
        let player = battle.add_ship(ShipBuilder::new(Behavior::Player).moves(1).build());
        battle.request_move_zone(player).unwrap();

        let art = render_ascii(&battle, &bare());
        // Six neighbours; the player's own cell shows its glyph.
        assert_eq!(art.matches('+').count(), 6);
    }

    #[test]
    fn test_legend_lists_ships() {
        let mut battle = battle_on(radius_board(1), 1);
        battle.add_ship(ShipBuilder::new(Behavior::Ally).build());
        let art = render_ascii(&battle, &AsciiConfig::default());
        assert!(art.contains("Turn 0"));
        assert!(art.contains("Ally"));
    }

    #[test]
    fn test_palette_colours_ships() {
        let mut battle = battle_on(radius_board(1), 1);
        battle.add_ship(ShipBuilder::new(Behavior::Player).build());
        let palette = BTreeMap::from([(Behavior::Player, "#ff8000".to_string())]);
        let config = AsciiConfig {
            show_legend: false,
            use_color: true,
            ..AsciiConfig::default()
        }
        .with_palette(&palette);

        let art = render_ascii(&battle, &config);
        assert!(art.contains("\x1b[38;2;255;128;0mP"));
    }

    #[test]
    fn test_bad_palette_entry_falls_back() {
        assert_eq!(truecolor("#4fc3f7").as_deref(), Some("\x1b[38;2;79;195;247m"));
        assert_eq!(truecolor("teal"), None);
        let palette = BTreeMap::from([(Behavior::Enemy, "teal".to_string())]);
        assert_eq!(ship_glyph(Behavior::Enemy, true, &palette).color, colors::RED);
    }
}

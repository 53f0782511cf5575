//! Decision policies for AI-controlled ships.
//!
//! Both sides move to a uniformly random cell of their move zone and aim at
//! where their target *could* be after moving, not where it will be.
//! Randomness is injected so a seeded match replays exactly.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::board::Board;
use crate::entities::{Behavior, Ship};
use crate::error::{GameError, Result};
use crate::grid::CubeCell;
use crate::placement::footprint_at;
use crate::turn::Battle;
use crate::zone::{move_zone, weapon_zone};

/// Uniformly random destination from the ship's move zone.
///
/// Stays on the current head when the zone is empty.
pub fn choose_move(board: &Board, ship: &Ship, rng: &mut impl Rng) -> CubeCell {
    let zone = move_zone(board, ship);
    let candidates: Vec<CubeCell> = zone.cells.into_iter().collect();
    candidates.choose(rng).copied().unwrap_or(ship.head)
}

/// Per-weapon shot cells aimed at the footprint `target` could move into.
///
/// `destination` is where `ship` is about to move; weapon zones are taken
/// from there. A weapon whose zone misses the predicted footprint holds
/// fire (`None`).
pub fn predictive_shots(
    board: &Board,
    ship: &Ship,
    destination: CubeCell,
    target: &Ship,
    rng: &mut impl Rng,
) -> Vec<Option<CubeCell>> {
    let grid = board.grid();
    let origin = footprint_at(board, ship, destination);
    let footprint = move_zone(board, target);

    ship.weapons
        .iter()
        .map(|weapon| {
            let reach = weapon_zone(grid, &origin, weapon.range, weapon.kind);
            let candidates = reach.intersection(&footprint);
            candidates.choose(rng).copied()
        })
        .collect()
}

/// Enemy policy: fire at the player's predicted footprint.
pub fn enemy_shots(
    board: &Board,
    ship: &Ship,
    destination: CubeCell,
    player: Option<&Ship>,
    rng: &mut impl Rng,
) -> Vec<Option<CubeCell>> {
    match player {
        Some(player) => predictive_shots(board, ship, destination, player, rng),
        None => vec![None; ship.weapons.len()],
    }
}

/// The enemy closest to `from` by hex distance; ties go to the lower id.
#[must_use]
pub fn closest_target<'a>(from: CubeCell, enemies: &[&'a Ship]) -> Option<&'a Ship> {
    enemies
        .iter()
        .min_by_key(|enemy| (from.hex_distance(enemy.head), enemy.id))
        .copied()
}

/// Ally policy: fire at the closest enemy's predicted footprint.
pub fn ally_shots(
    board: &Board,
    ship: &Ship,
    destination: CubeCell,
    enemies: &[&Ship],
    rng: &mut impl Rng,
) -> Vec<Option<CubeCell>> {
    match closest_target(destination, enemies) {
        Some(target) => predictive_shots(board, ship, destination, target, rng),
        None => vec![None; ship.weapons.len()],
    }
}

/// Plan the player's turn with the ally policy and commit it.
///
/// Used by headless runs and tests. Weapons with nothing to aim at hold
/// fire.
pub fn autopilot(battle: &mut Battle, rng: &mut impl Rng) -> Result<()> {
    let player = battle
        .player()
        .ok_or_else(|| GameError::InvalidConfiguration("no player ship to drive".into()))?;
    let id = player.id;
    let destination = choose_move(battle.board(), player, rng);
    let enemies: Vec<&Ship> = battle
        .ships()
        .values()
        .filter(|s| s.behavior == Behavior::Enemy && !s.health.is_destroyed())
        .collect();
    let shots = ally_shots(battle.board(), player, destination, &enemies, rng);

    if destination != player.head {
        battle.commit_move(id, destination)?;
    }
    for (index, target) in shots.into_iter().enumerate() {
        if let Some(target) = target {
            battle.commit_shot(id, index, target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Behavior, Health, Shape, Weapon, WeaponKind};
    use crate::grid::HexGrid;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ship(id: u64, behavior: Behavior, head: CubeCell, range: u32) -> Ship {
        Ship {
            id,
            name: format!("ship-{id}"),
            behavior,
            head,
            shape: Shape::Single,
            facing: behavior.canonical_facing(),
            health: Health::new(10),
            score: 0,
            weapons: vec![Weapon {
                name: "gun".into(),
                damage: 1,
                range,
                kind: WeaponKind::Point,
                reload: 0,
                shoot_cell: None,
            }],
            move_distance: 1,
            move_cell: None,
        }
    }

    #[test]
    fn test_choose_move_stays_in_zone() {
        let board = Board::new(HexGrid::radius(3).unwrap());
        let s = ship(1, Behavior::Enemy, CubeCell::ORIGIN, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            let dest = choose_move(&board, &s, &mut rng);
            assert!(dest.hex_distance(CubeCell::ORIGIN) <= 1);
        }
    }

    #[test]
    fn test_choose_move_falls_back_to_head() {
        let mut board = Board::new(HexGrid::radius(1).unwrap());
        let head = CubeCell::ORIGIN;
        for (i, n) in board.grid().neighbors(head).into_iter().enumerate() {
            board.add_obstacle(100 + i as u64, n);
        }
        board.add_obstacle(99, head);
        let s = ship(1, Behavior::Enemy, head, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(choose_move(&board, &s, &mut rng), head);
    }

    #[test]
    fn test_enemy_aims_inside_player_footprint() {
        let board = Board::new(HexGrid::radius(6).unwrap());
        let player = ship(1, Behavior::Player, CubeCell::new(3, 0, -3), 1);
        let enemy = ship(2, Behavior::Enemy, CubeCell::ORIGIN, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let shots = enemy_shots(&board, &enemy, CubeCell::ORIGIN, Some(&player), &mut rng);
        let target = shots[0].expect("footprint overlaps weapon zone");
        assert!(target.hex_distance(player.head) <= player.move_distance);
        assert!(target.hex_distance(CubeCell::ORIGIN) <= 3);
    }

    #[test]
    fn test_out_of_reach_holds_fire() {
        let board = Board::new(HexGrid::radius(8).unwrap());
        let player = ship(1, Behavior::Player, CubeCell::new(7, 0, -7), 1);
        let enemy = ship(2, Behavior::Enemy, CubeCell::new(-7, 0, 7), 2);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let shots = enemy_shots(&board, &enemy, enemy.head, Some(&player), &mut rng);
        assert_eq!(shots, vec![None]);
        assert_eq!(enemy_shots(&board, &enemy, enemy.head, None, &mut rng), vec![None]);
    }

    #[test]
    fn test_ally_targets_closest_enemy() {
        let near = ship(5, Behavior::Enemy, CubeCell::new(2, 0, -2), 1);
        let far = ship(3, Behavior::Enemy, CubeCell::new(-4, 0, 4), 1);
        let tied = ship(9, Behavior::Enemy, CubeCell::new(0, 2, -2), 1);
        let picked = closest_target(CubeCell::ORIGIN, &[&far, &tied, &near]).unwrap();
        assert_eq!(picked.id, 5);

        let board = Board::new(HexGrid::radius(6).unwrap());
        let ally = ship(1, Behavior::Ally, CubeCell::ORIGIN, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let shots = ally_shots(&board, &ally, CubeCell::ORIGIN, &[&far, &near], &mut rng);
        let target = shots[0].unwrap();
        assert!(target.hex_distance(near.head) <= 1);
    }

    #[test]
    fn test_same_seed_same_choice() {
        let board = Board::new(HexGrid::rect(12, 10).unwrap());
        let s = ship(1, Behavior::Ally, CubeCell::ORIGIN, 2);
        let a = choose_move(&board, &s, &mut ChaCha8Rng::seed_from_u64(42));
        let b = choose_move(&board, &s, &mut ChaCha8Rng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_autopilot_commits_valid_orders() {
        let mut battle = Battle::with_board(
            Board::new(HexGrid::radius(6).unwrap()),
            5,
            crate::config::BattleRules::default(),
        );
        let player = battle.add_ship(ship(1, Behavior::Player, CubeCell::ORIGIN, 3));
        battle.add_ship(ship(2, Behavior::Enemy, CubeCell::new(2, -1, -1), 1));

        let mut rng = ChaCha8Rng::seed_from_u64(8);
        autopilot(&mut battle, &mut rng).unwrap();
        let ship = battle.ship(player).unwrap();
        assert!(ship.has_pending_shots());
        assert!(battle.end_turn().is_ok());
    }
}

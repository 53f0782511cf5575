//! Movement tasks and the barrier that joins them.
//!
//! Every moving entity gets one [`MotionTask`]. Tasks are cooperative: each
//! [`poll`](MotionTask::poll) advances a single interpolation frame and
//! touches nothing but the task itself. The [`MovementBarrier`] starts them
//! together and returns only once every task has arrived, which is the one
//! synchronisation point of the movement phase.
//!
//! Interpolated positions are for presentation. The engine applies the
//! outcome (final cell and facing) after the join.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Poll;

use crate::board::Board;
use crate::entities::{Asteroid, EntityId, Facing};
use crate::grid::{CubeCell, HexDirection};
use crate::math::{Fixed, Vec2Fixed};

/// Shared "skip animation" flag.
///
/// Cancelled tasks jump to their destination on the next poll.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every task holding this token to finish.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of a finished motion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionOutcome {
    /// Entity that moved.
    pub id: EntityId,
    /// Cells travelled, start included.
    pub path: Vec<CubeCell>,
    /// Facing to apply on arrival.
    pub facing: Facing,
    /// Whether the animation was skipped.
    pub skipped: bool,
}

impl MotionOutcome {
    /// Final cell.
    #[must_use]
    pub fn arrival(&self) -> Option<CubeCell> {
        self.path.last().copied()
    }
}

/// One entity's interpolated move along a path.
#[derive(Debug, Clone)]
pub struct MotionTask {
    id: EntityId,
    path: Vec<CubeCell>,
    arrival_facing: Facing,
    frames_per_step: u32,
    frame: u32,
    cancel: Option<CancelToken>,
}

impl MotionTask {
    /// Task following `path` cell by cell.
    ///
    /// `frames_per_step` is clamped to at least one.
    #[must_use]
    pub fn new(id: EntityId, path: Vec<CubeCell>, arrival_facing: Facing, frames_per_step: u32) -> Self {
        Self {
            id,
            path,
            arrival_facing,
            frames_per_step: frames_per_step.max(1),
            frame: 0,
            cancel: None,
        }
    }

    /// Task routed from `from` to `to` around obstacles.
    ///
    /// Jumps straight to `to` when no obstacle-free route exists.
    #[must_use]
    pub fn routed(
        board: &Board,
        id: EntityId,
        from: CubeCell,
        to: CubeCell,
        arrival_facing: Facing,
        frames_per_step: u32,
    ) -> Self {
        let path = board
            .grid()
            .shortest_path_with(from, to, |cell| board.is_open(cell))
            .unwrap_or_else(|| vec![from, to]);
        Self::new(id, path, arrival_facing, frames_per_step)
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Entity being moved.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Cells travelled, start included.
    #[must_use]
    pub fn path(&self) -> &[CubeCell] {
        &self.path
    }

    /// Frames needed to reach the end of the path.
    #[must_use]
    pub fn total_frames(&self) -> u32 {
        let steps = self.path.len().saturating_sub(1) as u32;
        steps * self.frames_per_step
    }

    /// Completed fraction in `0..=1`.
    #[must_use]
    pub fn progress(&self) -> Fixed {
        let total = self.total_frames();
        if total == 0 {
            return Fixed::ONE;
        }
        Fixed::from_num(self.frame) / Fixed::from_num(total)
    }

    /// Whether the task has reached the end of its path.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.frame >= self.total_frames()
    }

    fn segment(&self) -> (usize, u32) {
        let step = (self.frame / self.frames_per_step) as usize;
        (step, self.frame % self.frames_per_step)
    }

    /// Interpolated centre in layout space.
    #[must_use]
    pub fn position(&self) -> Vec2Fixed {
        let Some(last) = self.path.last() else {
            return Vec2Fixed::ZERO;
        };
        if self.is_finished() {
            return Vec2Fixed::from_cell(*last);
        }
        let (step, sub) = self.segment();
        let from = Vec2Fixed::from_cell(self.path[step]);
        let to = Vec2Fixed::from_cell(self.path[step + 1]);
        from.lerp(to, Fixed::from_num(sub) / Fixed::from_num(self.frames_per_step))
    }

    /// Facing while moving: toward the current step, or the arrival facing
    /// once done.
    #[must_use]
    pub fn heading(&self) -> Facing {
        if self.is_finished() {
            return self.arrival_facing;
        }
        let (step, _) = self.segment();
        HexDirection::between(self.path[step], self.path[step + 1])
            .map_or(self.arrival_facing, Facing::Toward)
    }

    /// Advance one frame.
    pub fn poll(&mut self) -> Poll<MotionOutcome> {
        let skipped = self.cancel.as_ref().is_some_and(CancelToken::is_cancelled);
        if skipped {
            self.frame = self.total_frames();
        } else if !self.is_finished() {
            self.frame += 1;
        }

        if self.is_finished() {
            Poll::Ready(MotionOutcome {
                id: self.id,
                path: self.path.clone(),
                facing: self.arrival_facing,
                skipped,
            })
        } else {
            Poll::Pending
        }
    }
}

/// Fan-out/fan-in over a set of motion tasks.
#[derive(Debug, Default)]
pub struct MovementBarrier {
    tasks: Vec<MotionTask>,
    cancel: CancelToken,
}

impl MovementBarrier {
    /// Empty barrier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that skips every task joined here.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Add a task. Tasks without their own token share the barrier's.
    pub fn push(&mut self, task: MotionTask) {
        let task = if task.cancel.is_some() {
            task
        } else {
            task.with_cancel(self.cancel.clone())
        };
        self.tasks.push(task);
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is moving.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Poll every task round-robin until all are ready.
    ///
    /// Outcomes come back in push order. Returns the outcomes and the number
    /// of rounds it took.
    pub fn join(mut self) -> (Vec<MotionOutcome>, u32) {
        let mut outcomes: Vec<Option<MotionOutcome>> = vec![None; self.tasks.len()];
        let mut rounds = 0;

        while outcomes.iter().any(Option::is_none) {
            rounds += 1;
            for (task, slot) in self.tasks.iter_mut().zip(outcomes.iter_mut()) {
                if slot.is_some() {
                    continue;
                }
                if let Poll::Ready(outcome) = task.poll() {
                    *slot = Some(outcome);
                }
            }
        }

        tracing::debug!(tasks = outcomes.len(), rounds, "Movement barrier joined");
        (outcomes.into_iter().flatten().collect(), rounds)
    }
}

/// What one drift step does to an asteroid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// No direction; the rock stays put.
    Stationary,
    /// The next cell holds an obstacle; no move, no spin.
    Blocked,
    /// The next cell is off the grid; the rock is destroyed.
    LeftGrid,
    /// The rock moves here and spins half a turn.
    Moved(CubeCell),
}

/// Resolve one drift step without mutating the asteroid.
#[must_use]
pub fn drift_step(board: &Board, asteroid: &Asteroid) -> Drift {
    let Some(direction) = asteroid.direction else {
        return Drift::Stationary;
    };
    let next = asteroid.cell.step(direction);
    if !board.grid().contains(next) {
        Drift::LeftGrid
    } else if board.has_obstacle(next) {
        Drift::Blocked
    } else {
        Drift::Moved(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AsteroidSize, Health, Spin};
    use crate::grid::HexGrid;

    fn asteroid(cell: CubeCell, direction: Option<HexDirection>) -> Asteroid {
        Asteroid {
            id: 40,
            cell,
            size: AsteroidSize::Big,
            health: Health::new(20),
            mass: Fixed::from_num(30),
            direction,
            spin: Spin::Clockwise,
            half_turns: 0,
        }
    }

    #[test]
    fn test_task_completes_after_all_frames() {
        let path = vec![CubeCell::ORIGIN, CubeCell::new(1, 0, -1), CubeCell::new(2, 0, -2)];
        let mut task = MotionTask::new(1, path.clone(), Facing::Up, 4);
        assert_eq!(task.total_frames(), 8);
        assert_eq!(task.heading(), Facing::Toward(HexDirection::East));

        for _ in 0..7 {
            assert!(task.poll().is_pending());
        }
        let Poll::Ready(outcome) = task.poll() else {
            panic!("task should be done after 8 frames");
        };
        assert_eq!(outcome.path, path);
        assert_eq!(outcome.arrival(), Some(CubeCell::new(2, 0, -2)));
        assert_eq!(outcome.facing, Facing::Up);
        assert!(!outcome.skipped);
        assert_eq!(task.progress(), Fixed::ONE);
        assert_eq!(task.heading(), Facing::Up);
    }

    #[test]
    fn test_position_interpolates() {
        let mut task = MotionTask::new(1, vec![CubeCell::ORIGIN, CubeCell::new(0, 1, -1)], Facing::Down, 2);
        assert_eq!(task.position(), Vec2Fixed::ZERO);
        let _ = task.poll();
        let end = Vec2Fixed::from_cell(CubeCell::new(0, 1, -1));
        assert_eq!(task.position(), Vec2Fixed::ZERO.lerp(end, Fixed::from_num(0.5)));
        assert_eq!(task.progress(), Fixed::from_num(0.5));
    }

    #[test]
    fn test_routed_avoids_obstacles() {
        let mut board = Board::new(HexGrid::radius(3).unwrap());
        board.add_obstacle(9, CubeCell::new(1, 0, -1));
        let task = MotionTask::routed(&board, 1, CubeCell::ORIGIN, CubeCell::new(2, 0, -2), Facing::Up, 1);
        assert_eq!(task.path().len(), 4);
        assert!(!task.path().contains(&CubeCell::new(1, 0, -1)));
    }

    #[test]
    fn test_barrier_waits_for_longest() {
        let mut barrier = MovementBarrier::new();
        barrier.push(MotionTask::new(1, vec![CubeCell::ORIGIN, CubeCell::new(1, 0, -1)], Facing::Up, 3));
        barrier.push(MotionTask::new(
            2,
            vec![CubeCell::new(0, 2, -2), CubeCell::new(0, 1, -1), CubeCell::ORIGIN],
            Facing::Down,
            3,
        ));
        assert_eq!(barrier.len(), 2);

        let (outcomes, rounds) = barrier.join();
        assert_eq!(rounds, 6);
        assert_eq!(outcomes.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_cancel_skips_animation() {
        let mut barrier = MovementBarrier::new();
        barrier.push(MotionTask::new(
            7,
            vec![CubeCell::ORIGIN, CubeCell::new(1, 0, -1), CubeCell::new(2, 0, -2)],
            Facing::Up,
            100,
        ));
        barrier.cancel_token().cancel();
        let (outcomes, rounds) = barrier.join();
        assert_eq!(rounds, 1);
        assert!(outcomes[0].skipped);
        assert_eq!(outcomes[0].arrival(), Some(CubeCell::new(2, 0, -2)));
    }

    #[test]
    fn test_empty_barrier_joins_immediately() {
        let (outcomes, rounds) = MovementBarrier::new().join();
        assert!(outcomes.is_empty());
        assert_eq!(rounds, 0);
    }

    #[test]
    fn test_drift_outcomes() {
        let mut board = Board::new(HexGrid::radius(2).unwrap());
        assert_eq!(drift_step(&board, &asteroid(CubeCell::ORIGIN, None)), Drift::Stationary);
        assert_eq!(
            drift_step(&board, &asteroid(CubeCell::ORIGIN, Some(HexDirection::East))),
            Drift::Moved(CubeCell::new(1, 0, -1))
        );
        assert_eq!(
            drift_step(&board, &asteroid(CubeCell::new(2, 0, -2), Some(HexDirection::East))),
            Drift::LeftGrid
        );
        board.add_obstacle(3, CubeCell::new(1, 0, -1));
        assert_eq!(
            drift_step(&board, &asteroid(CubeCell::ORIGIN, Some(HexDirection::East))),
            Drift::Blocked
        );
    }
}

//! The two-phase IDA* search.
//!
//! Phase 1 drives the scrambled cube into the reduced subgroup — every
//! corner and edge oriented, the four middle-slice edges back in their
//! slice — searching over the `(flip, twist, slice)` coordinates with all
//! 18 face moves. Each phase-1 path that lands in the subgroup at exactly
//! the current depth hands over to phase 2, which finishes the cube using
//! only subgroup-preserving moves over the permutation coordinates. The
//! driver deepens phase 1 one ply at a time, so the first completed
//! solution is the shortest this move-generation order can produce.
//!
//! Both searches run on an explicit stack: the ply history lives in flat
//! arrays indexed by depth, with an advance/backtrack loop instead of
//! recursion, so a resumable search costs O(depth) memory and the full
//! path stays addressable when a candidate reaches phase 2.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};
use cube_core::cube::{CubeState, Direction, Face, MoveInstance, MoveSequence};
use log::{debug, info};
use thiserror::Error;

use crate::coords::CoordCube;
use crate::tables::{MERGE_NONE, N_SLICE1, N_SLICE2, PARITY_MOVE, Tables};
use crate::{start, success, working};

/// One more than the longest path the search will ever hold.
const MAX_PLIES: usize = 31;
/// The default and largest supported solution length bound.
pub const DEFAULT_MAX_DEPTH: usize = 30;
/// Phase 2 never extends a phase-1 path by more than this many moves.
const MAX_DEPTH_PHASE2: usize = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SolveError {
    #[error("The configuration is not reachable by face turns")]
    Unsolvable,
    #[error("No solution within the configured maximum depth")]
    NoSolutionWithinDepth,
    #[error("Time limit exceeded")]
    TimeLimitExceeded,
    #[error("The solve was cancelled")]
    Cancelled,
}

/// Whether a move on `axis` directly after a move on `prev_axis` is
/// redundant: same face twice, or opposite faces in the non-canonical
/// order (D before U, L before R, B before F) — the commuted sequence
/// has already been searched.
fn is_redundant(prev_axis: usize, axis: usize) -> bool {
    prev_axis == axis || prev_axis == axis + 3
}

/// The immutable half of a solve: shared tables plus configuration.
/// One solver value can run any number of solves, sequentially or from
/// several threads.
#[derive(Clone, Copy)]
pub struct TwoPhaseSolver {
    tables: &'static Tables,
    max_depth: usize,
    time_limit: Option<Duration>,
}

impl Default for TwoPhaseSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TwoPhaseSolver {
    /// Creates a solver with the default depth bound of 30 and no time
    /// limit. The first construction in a process generates the move and
    /// pruning tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Tables::get(),
            max_depth: DEFAULT_MAX_DEPTH,
            time_limit: None,
        }
    }

    /// Never report a solution longer than `max_depth` moves. Values
    /// above 30 are clamped; 20 suffices for any cube but can search for
    /// a very long time.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.min(DEFAULT_MAX_DEPTH);
        self
    }

    /// Give up with [`SolveError::TimeLimitExceeded`] once this much
    /// wall-clock time has elapsed. The limit is checked between plies,
    /// so the overshoot is a single table lookup.
    #[must_use]
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    /// Searches for a move sequence that solves `cube`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is unreachable, if no solution exists
    /// within the depth bound, or if the time limit runs out. See
    /// [`SolveError`].
    pub fn solve(&self, cube: &CubeState) -> Result<MoveSequence, SolveError> {
        self.solve_with_cancel(cube, None)
    }

    /// Runs the solve on a dedicated worker thread and returns a handle
    /// that delivers the result exactly once. Dropping the handle
    /// detaches the search; [`SolveHandle::cancel`] stops it at the next
    /// ply boundary.
    #[must_use]
    pub fn solve_in_background(&self, cube: CubeState) -> SolveHandle {
        let (sender, receiver) = bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let solver = *self;
        let cancel_flag = Arc::clone(&cancel);
        thread::spawn(move || {
            let result = solver.solve_with_cancel(&cube, Some(&cancel_flag));
            // The caller may have dropped the handle; delivery is
            // best-effort.
            let _ = sender.send(result);
        });
        SolveHandle { receiver, cancel }
    }

    fn solve_with_cancel(
        &self,
        cube: &CubeState,
        cancel: Option<&AtomicBool>,
    ) -> Result<MoveSequence, SolveError> {
        if !cube.is_solvable() {
            return Err(SolveError::Unsolvable);
        }
        if cube.is_solved() {
            return Ok(MoveSequence::default());
        }
        info!(start!("Searching for a two-phase solution"));
        let start_time = Instant::now();

        let coords = CoordCube::from_cube_state(cube);
        let deadline = self.time_limit.map(|limit| start_time + limit);
        let mut session = SearchSession::new(self.tables, deadline, cancel);
        let (raw, depth_phase1) = session.phase1_search(&coords, self.max_depth)?;

        // Replay the accepted path onto the cube, then collapse redundant
        // adjacent moves; the search itself never touches the live cube.
        let accepted = MoveSequence::from(raw);
        debug_assert!(cube.apply_sequence(&accepted).is_solved());
        let solution = accepted.collapse_redundant();
        info!(
            success!("Solution of {} moves found in {:.3}s ({} in phase 1)"),
            solution.len(),
            start_time.elapsed().as_secs_f64(),
            depth_phase1,
        );
        Ok(solution)
    }
}

/// A single-shot handle to a background solve.
pub struct SolveHandle {
    receiver: Receiver<Result<MoveSequence, SolveError>>,
    cancel: Arc<AtomicBool>,
}

impl SolveHandle {
    /// Asks the search to stop; it notices at the next ply boundary and
    /// delivers [`SolveError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Blocks until the search delivers its result.
    #[must_use = "the solve result should be inspected"]
    pub fn wait(self) -> Result<MoveSequence, SolveError> {
        // A disconnected channel means the worker died without a result;
        // report it like an external stop rather than panicking.
        self.receiver.recv().unwrap_or(Err(SolveError::Cancelled))
    }

    /// Returns the result if the search has already finished.
    pub fn try_wait(&self) -> Option<Result<MoveSequence, SolveError>> {
        self.receiver.try_recv().ok()
    }
}

/// The mutable half of a solve: one ply-indexed arena shared by both
/// phases, exclusively owned for the duration of one search. `axis[n]`
/// and `power[n]` hold the move under consideration at ply `n`; the
/// coordinate arrays hold the projection of the path prefix, so entry
/// `n + 1` is always one table lookup away from entry `n`.
struct SearchSession<'a> {
    tables: &'static Tables,
    axis: [usize; MAX_PLIES],
    power: [usize; MAX_PLIES],
    flip: [u16; MAX_PLIES],
    twist: [u16; MAX_PLIES],
    slice: [u16; MAX_PLIES],
    parity: [u8; MAX_PLIES],
    urfdlf: [u16; MAX_PLIES],
    frbr: [u16; MAX_PLIES],
    urul: [u16; MAX_PLIES],
    ubdf: [u16; MAX_PLIES],
    urdf: [u32; MAX_PLIES],
    min_dist_phase1: [u8; MAX_PLIES],
    min_dist_phase2: [u8; MAX_PLIES],
    deadline: Option<Instant>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> SearchSession<'a> {
    fn new(
        tables: &'static Tables,
        deadline: Option<Instant>,
        cancel: Option<&'a AtomicBool>,
    ) -> Self {
        Self {
            tables,
            axis: [0; MAX_PLIES],
            power: [0; MAX_PLIES],
            flip: [0; MAX_PLIES],
            twist: [0; MAX_PLIES],
            slice: [0; MAX_PLIES],
            parity: [0; MAX_PLIES],
            urfdlf: [0; MAX_PLIES],
            frbr: [0; MAX_PLIES],
            urul: [0; MAX_PLIES],
            ubdf: [0; MAX_PLIES],
            urdf: [0; MAX_PLIES],
            min_dist_phase1: [0; MAX_PLIES],
            min_dist_phase2: [0; MAX_PLIES],
            deadline,
            cancel,
        }
    }

    fn check_interrupted(&self) -> Result<(), SolveError> {
        if let Some(cancel) = self.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(SolveError::Cancelled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(SolveError::TimeLimitExceeded);
            }
        }
        Ok(())
    }

    fn chosen_move(&self, ply: usize) -> MoveInstance {
        MoveInstance::new(
            Face::from_axis(self.axis[ply]),
            Direction::from_power(self.power[ply]),
        )
    }

    /// Iterative-deepening search for a phase-1 path whose phase-2
    /// extension completes the cube. Returns the raw move path and the
    /// phase-1 depth it was found at.
    fn phase1_search(
        &mut self,
        coords: &CoordCube,
        max_depth: usize,
    ) -> Result<(Vec<MoveInstance>, usize), SolveError> {
        self.axis[0] = 0;
        self.power[0] = 0;
        self.flip[0] = coords.flip;
        self.twist[0] = coords.twist;
        self.slice[0] = coords.slice();
        self.parity[0] = coords.parity;
        self.frbr[0] = coords.frbr;
        self.urfdlf[0] = coords.urfdlf;
        self.urul[0] = coords.urul;
        self.ubdf[0] = coords.ubdf;

        // Seeding the estimate at 1 makes the first deepening pass move
        // straight on to depth 1.
        self.min_dist_phase1[1] = 1;
        let mut n = 0;
        let mut busy = false;
        let mut depth_phase1 = 0;

        loop {
            // Advance to the next unpruned move in generation order:
            // deepen while the budget allows, otherwise step the current
            // ply's move, backtracking plies whose moves are exhausted.
            loop {
                if depth_phase1 - n > usize::from(self.min_dist_phase1[n + 1]) && !busy {
                    // Extend the path. The seed axis skips the previous
                    // ply's axis group outright.
                    let seed = if self.axis[n] == 0 || self.axis[n] == 3 {
                        1
                    } else {
                        0
                    };
                    n += 1;
                    self.axis[n] = seed;
                    self.power[n] = 1;
                } else {
                    self.power[n] += 1;
                    if self.power[n] > 3 {
                        loop {
                            self.axis[n] += 1;
                            if self.axis[n] > 5 {
                                if n == 0 {
                                    if depth_phase1 >= max_depth {
                                        return Err(SolveError::NoSolutionWithinDepth);
                                    }
                                    depth_phase1 += 1;
                                    debug!(working!("Deepening phase 1 to {}"), depth_phase1);
                                    self.axis[0] = 0;
                                    self.power[0] = 1;
                                    busy = false;
                                    break;
                                }
                                n -= 1;
                                busy = true;
                                break;
                            }
                            self.power[n] = 1;
                            busy = false;
                            if !(n != 0 && is_redundant(self.axis[n - 1], self.axis[n])) {
                                break;
                            }
                        }
                    } else {
                        busy = false;
                    }
                }
                if !busy {
                    break;
                }
            }

            // Ply boundary: the only place the search may be stopped, so
            // the arrays are never left mid-update.
            self.check_interrupted()?;

            // One table lookup per coordinate advances the frame to the
            // next ply.
            let mv = 3 * self.axis[n] + self.power[n] - 1;
            self.flip[n + 1] = self.tables.flip_move[usize::from(self.flip[n])][mv];
            self.twist[n + 1] = self.tables.twist_move[usize::from(self.twist[n])][mv];
            self.slice[n + 1] =
                self.tables.frtobr_move[usize::from(self.slice[n]) * 24][mv] / 24;
            self.min_dist_phase1[n + 1] = self.tables.slice_flip_prune
                [N_SLICE1 * usize::from(self.flip[n + 1]) + usize::from(self.slice[n + 1])]
            .max(
                self.tables.slice_twist_prune[N_SLICE1 * usize::from(self.twist[n + 1])
                    + usize::from(self.slice[n + 1])],
            );

            // Estimate 0 means the subgroup is reached. Only plies close
            // to the target depth are worth a phase-2 attempt; bumping
            // the estimate past 5 forces the loop above to step onward
            // instead of re-entering this branch.
            if self.min_dist_phase1[n + 1] == 0 && n + 5 >= depth_phase1 {
                self.min_dist_phase1[n + 1] = 10;
                if n + 1 == depth_phase1 {
                    if let Some(total) = self.phase2_extend(depth_phase1, max_depth)? {
                        let path = (0..total).map(|i| self.chosen_move(i)).collect();
                        return Ok((path, depth_phase1));
                    }
                }
            }
        }
    }

    /// Projects the permutation coordinates through the completed
    /// phase-1 path and searches for a subgroup-move extension that
    /// finishes the cube. `Ok(Some(total))` is the combined path length;
    /// `Ok(None)` tells phase 1 to keep looking.
    fn phase2_extend(
        &mut self,
        depth_phase1: usize,
        max_depth: usize,
    ) -> Result<Option<usize>, SolveError> {
        let max_depth_phase2 = MAX_DEPTH_PHASE2.min(max_depth - depth_phase1);

        for i in 0..depth_phase1 {
            let mv = 3 * self.axis[i] + self.power[i] - 1;
            self.urfdlf[i + 1] = self.tables.urfdlf_move[usize::from(self.urfdlf[i])][mv];
            self.frbr[i + 1] = self.tables.frtobr_move[usize::from(self.frbr[i])][mv];
            self.parity[i + 1] = PARITY_MOVE[usize::from(self.parity[i])][mv];
        }
        let d1 = self.tables.slice_urfdlf_parity_prune[(N_SLICE2
            * usize::from(self.urfdlf[depth_phase1])
            + usize::from(self.frbr[depth_phase1]))
            * 2
            + usize::from(self.parity[depth_phase1])];
        if usize::from(d1) > max_depth_phase2 {
            return Ok(None);
        }

        // The corner bound passed; only now is the edge projection worth
        // computing.
        for i in 0..depth_phase1 {
            let mv = 3 * self.axis[i] + self.power[i] - 1;
            self.urul[i + 1] = self.tables.urtoul_move[usize::from(self.urul[i])][mv];
            self.ubdf[i + 1] = self.tables.ubtodf_move[usize::from(self.ubdf[i])][mv];
        }
        let merged = self.tables.merge_urtodf[usize::from(self.urul[depth_phase1])]
            [usize::from(self.ubdf[depth_phase1])];
        debug_assert_ne!(merged, MERGE_NONE);
        self.urdf[depth_phase1] = u32::from(merged);

        let d2 = self.tables.slice_urtodf_parity_prune[(N_SLICE2
            * self.urdf[depth_phase1] as usize
            + usize::from(self.frbr[depth_phase1]))
            * 2
            + usize::from(self.parity[depth_phase1])];
        if usize::from(d2) > max_depth_phase2 {
            return Ok(None);
        }

        self.min_dist_phase2[depth_phase1] = d1.max(d2);
        if self.min_dist_phase2[depth_phase1] == 0 {
            // The phase-1 path alone solved the cube.
            return Ok(Some(depth_phase1));
        }

        let mut depth_phase2 = 1;
        let mut n = depth_phase1;
        let mut busy = false;
        self.axis[depth_phase1] = 0;
        self.power[depth_phase1] = 0;
        self.min_dist_phase2[n + 1] = 1;

        loop {
            // Same advance/backtrack scheme as phase 1, restricted to the
            // subgroup generators: U and D keep all three powers, every
            // other face is a half turn only.
            loop {
                if depth_phase1 + depth_phase2 - n > usize::from(self.min_dist_phase2[n + 1])
                    && !busy
                {
                    let full_range = self.axis[n] == 0 || self.axis[n] == 3;
                    n += 1;
                    if full_range {
                        self.axis[n] = 1;
                        self.power[n] = 2;
                    } else {
                        self.axis[n] = 0;
                        self.power[n] = 1;
                    }
                } else {
                    let exhausted = if self.axis[n] == 0 || self.axis[n] == 3 {
                        self.power[n] += 1;
                        self.power[n] > 3
                    } else {
                        self.power[n] += 2;
                        self.power[n] > 3
                    };
                    if exhausted {
                        loop {
                            self.axis[n] += 1;
                            if self.axis[n] > 5 {
                                if n == depth_phase1 {
                                    if depth_phase2 >= max_depth_phase2 {
                                        return Ok(None);
                                    }
                                    depth_phase2 += 1;
                                    self.axis[n] = 0;
                                    self.power[n] = 1;
                                    busy = false;
                                    break;
                                }
                                n -= 1;
                                busy = true;
                                break;
                            }
                            self.power[n] = if self.axis[n] == 0 || self.axis[n] == 3 {
                                1
                            } else {
                                2
                            };
                            busy = false;
                            if !(n != depth_phase1
                                && is_redundant(self.axis[n - 1], self.axis[n]))
                            {
                                break;
                            }
                        }
                    } else {
                        busy = false;
                    }
                }
                if !busy {
                    break;
                }
            }

            self.check_interrupted()?;

            let mv = 3 * self.axis[n] + self.power[n] - 1;
            self.urfdlf[n + 1] = self.tables.urfdlf_move[usize::from(self.urfdlf[n])][mv];
            self.frbr[n + 1] = self.tables.frtobr_move[usize::from(self.frbr[n])][mv];
            self.parity[n + 1] = PARITY_MOVE[usize::from(self.parity[n])][mv];
            self.urdf[n + 1] = self.tables.urtodf_move[self.urdf[n] as usize][mv];

            let corner_bound = self.tables.slice_urfdlf_parity_prune[(N_SLICE2
                * usize::from(self.urfdlf[n + 1])
                + usize::from(self.frbr[n + 1]))
                * 2
                + usize::from(self.parity[n + 1])];
            let edge_bound = self.tables.slice_urtodf_parity_prune[(N_SLICE2
                * self.urdf[n + 1] as usize
                + usize::from(self.frbr[n + 1]))
                * 2
                + usize::from(self.parity[n + 1])];
            self.min_dist_phase2[n + 1] = corner_bound.max(edge_bound);

            // Both permutation halves solved at once; parity is even by
            // implication.
            if self.min_dist_phase2[n + 1] == 0 {
                return Ok(Some(depth_phase1 + depth_phase2));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_solution(scramble: &str) -> (Vec<MoveInstance>, usize) {
        let cube = CubeState::default().apply_sequence(&scramble.parse().unwrap());
        let coords = CoordCube::from_cube_state(&cube);
        let mut session = SearchSession::new(Tables::get(), None, None);
        session
            .phase1_search(&coords, DEFAULT_MAX_DEPTH)
            .expect("scramble is solvable within the default bound")
    }

    #[test_log::test]
    fn test_raw_path_obeys_generation_skip_rule() {
        let (raw, depth_phase1) = raw_solution("R U F' D2 L B U2 R' F L2 D");
        // Within each phase no two consecutive moves share an axis or
        // form an opposite-axis pair in non-canonical order. The phase
        // boundary itself is exempt; the collapse pass handles it.
        for window in raw[..depth_phase1].windows(2) {
            assert!(!is_redundant(window[0].face.axis(), window[1].face.axis()));
        }
        for window in raw[depth_phase1..].windows(2) {
            assert!(!is_redundant(window[0].face.axis(), window[1].face.axis()));
        }
    }

    #[test_log::test]
    fn test_phase2_moves_stay_in_subgroup() {
        let (raw, depth_phase1) = raw_solution("F L2 D' B U R2 F2 D L' U2 B'");
        for m in &raw[depth_phase1..] {
            assert!(
                m.dir == Direction::Double || m.face.axis() == 0 || m.face.axis() == 3,
                "phase-2 move {m} leaves the subgroup",
            );
        }
    }

    #[test_log::test]
    fn test_phase1_prefix_reaches_subgroup() {
        let (raw, depth_phase1) = raw_solution("D2 R F' U L2 B2 D' R2 U'");
        let prefix = MoveSequence::from(raw[..depth_phase1].to_vec());
        let cube = CubeState::default()
            .apply_sequence(&"D2 R F' U L2 B2 D' R2 U'".parse().unwrap())
            .apply_sequence(&prefix);
        let coords = CoordCube::from_cube_state(&cube);
        assert_eq!(coords.flip, 0);
        assert_eq!(coords.twist, 0);
        assert_eq!(coords.slice(), 0);
    }
}

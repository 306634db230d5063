//! Precomputed move-transition and pruning tables.
//!
//! A move table answers `next(coordinate, move) -> coordinate` for one
//! coordinate family and all 18 face moves; it is generated by sweeping
//! every value of the family through every face turn on a scratch cubie
//! cube. A pruning table stores, for a combined coordinate, the exact
//! number of moves needed to reach the relevant goal within that
//! projection of the puzzle — an admissible lower bound on the true
//! remaining distance, used to prune the IDA* searches.
//!
//! Generating everything takes a few seconds; the [`Tables::get`]
//! accessor does it once per process behind a `LazyLock` and every solve
//! shares the result immutably.

use std::sync::LazyLock;
use std::time::Instant;

use cube_core::cube::{CubeState, MOVE_CUBES};
use log::debug;

use crate::coords;
use crate::working;

pub const N_TWIST: usize = 2187;
pub const N_FLIP: usize = 2048;
/// Positions of the four slice edges, order ignored.
pub const N_SLICE1: usize = 495;
/// Orders of the four slice edges within the slice.
pub const N_SLICE2: usize = 24;
pub const N_FRTOBR: usize = 11880;
pub const N_URFTODLF: usize = 20160;
pub const N_URTODF: usize = 20160;
pub const N_URTOUL: usize = 1320;
pub const N_UBTODF: usize = 1320;
pub const N_MERGE: usize = 336;
pub const N_MOVE: usize = 18;

/// The moves that stay inside the reduced subgroup: U and D with any
/// power, every other face as a half turn only.
pub const PHASE2_MOVES: [usize; 10] = [0, 1, 2, 4, 7, 9, 10, 11, 13, 16];

const ALL_MOVE_INDICES: [usize; N_MOVE] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17,
];

/// Permutation parity transition: a quarter turn toggles parity, a half
/// turn preserves it.
pub const PARITY_MOVE: [[u8; N_MOVE]; 2] = [
    [1, 0, 1, 1, 0, 1, 1, 0, 1, 1, 0, 1, 1, 0, 1, 1, 0, 1],
    [0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0],
];

/// Marker for a pair of UR..UL and UB..DF placements that overlap and so
/// describe no configuration. Never hit by coordinates projected from a
/// real phase-2 state.
pub const MERGE_NONE: u16 = u16::MAX;

pub struct Tables {
    pub twist_move: Vec<[u16; N_MOVE]>,
    pub flip_move: Vec<[u16; N_MOVE]>,
    pub frtobr_move: Vec<[u16; N_MOVE]>,
    pub urfdlf_move: Vec<[u16; N_MOVE]>,
    pub urtodf_move: Vec<[u32; N_MOVE]>,
    pub urtoul_move: Vec<[u16; N_MOVE]>,
    pub ubtodf_move: Vec<[u16; N_MOVE]>,
    /// `merge_urtodf[urul][ubdf]` for `urul, ubdf < 336` joins the two
    /// three-edge coordinates into the six-edge UR..DF coordinate.
    pub merge_urtodf: Vec<[u16; N_MERGE]>,
    /// Lower bound on moves to reach flip 0 and slice 0, indexed by
    /// `N_SLICE1 * flip + slice`.
    pub slice_flip_prune: Box<[u8]>,
    /// Lower bound on moves to reach twist 0 and slice 0, indexed by
    /// `N_SLICE1 * twist + slice`.
    pub slice_twist_prune: Box<[u8]>,
    /// Phase-2 lower bound over corner permutation, slice order and
    /// parity, indexed by `(N_SLICE2 * urfdlf + frbr) * 2 + parity`.
    pub slice_urfdlf_parity_prune: Box<[u8]>,
    /// Phase-2 lower bound over the UR..DF edge permutation, slice order
    /// and parity, indexed by `(N_SLICE2 * urtodf + frbr) * 2 + parity`.
    pub slice_urtodf_parity_prune: Box<[u8]>,
}

static TABLES: LazyLock<Tables> = LazyLock::new(Tables::generate);

impl Tables {
    /// The process-wide table set, generated on first use.
    #[must_use]
    pub fn get() -> &'static Tables {
        &TABLES
    }

    fn generate() -> Tables {
        let generation_start = Instant::now();

        let twist_move = narrow(move_table(
            N_TWIST,
            |s, v| coords::set_twist(s, v as u16),
            |s| usize::from(coords::get_twist(s)),
            CubeState::corner_multiply,
        ));
        let flip_move = narrow(move_table(
            N_FLIP,
            |s, v| coords::set_flip(s, v as u16),
            |s| usize::from(coords::get_flip(s)),
            CubeState::edge_multiply,
        ));
        let frtobr_move = narrow(move_table(
            N_FRTOBR,
            |s, v| coords::set_frtobr(s, v as u16),
            |s| usize::from(coords::get_frtobr(s)),
            CubeState::edge_multiply,
        ));
        let urfdlf_move = narrow(move_table(
            N_URFTODLF,
            |s, v| coords::set_urfdlf(s, v as u16),
            |s| usize::from(coords::get_urfdlf(s)),
            CubeState::corner_multiply,
        ));
        // UR..DF values escape the phase-2 range under phase-1 moves, so
        // this one keeps the wide representation.
        let urtodf_move = move_table(
            N_URTODF,
            |s, v| coords::set_urtodf(s, v as u32),
            |s| coords::get_urtodf(s) as usize,
            CubeState::edge_multiply,
        );
        let urtoul_move = narrow(move_table(
            N_URTOUL,
            |s, v| coords::set_urtoul(s, v as u16),
            |s| usize::from(coords::get_urtoul(s)),
            CubeState::edge_multiply,
        ));
        let ubtodf_move = narrow(move_table(
            N_UBTODF,
            |s, v| coords::set_ubtodf(s, v as u16),
            |s| usize::from(coords::get_ubtodf(s)),
            CubeState::edge_multiply,
        ));
        debug!(
            working!("Move tables generated in {:.3}s"),
            generation_start.elapsed().as_secs_f64()
        );

        let mut merge_urtodf = vec![[0u16; N_MERGE]; N_MERGE];
        for urul in 0..N_MERGE {
            for ubdf in 0..N_MERGE {
                merge_urtodf[urul][ubdf] = coords::merge_urtodf(urul as u16, ubdf as u16)
                    .map_or(MERGE_NONE, |merged| merged as u16);
            }
        }

        let prune_start = Instant::now();
        let slice_flip_prune = prune_table(
            N_SLICE1 * N_FLIP,
            &ALL_MOVE_INDICES,
            |idx, mv| {
                let flip = idx / N_SLICE1;
                let slice = idx % N_SLICE1;
                let new_flip = usize::from(flip_move[flip][mv]);
                let new_slice = usize::from(frtobr_move[slice * 24][mv]) / 24;
                N_SLICE1 * new_flip + new_slice
            },
        );
        let slice_twist_prune = prune_table(
            N_SLICE1 * N_TWIST,
            &ALL_MOVE_INDICES,
            |idx, mv| {
                let twist = idx / N_SLICE1;
                let slice = idx % N_SLICE1;
                let new_twist = usize::from(twist_move[twist][mv]);
                let new_slice = usize::from(frtobr_move[slice * 24][mv]) / 24;
                N_SLICE1 * new_twist + new_slice
            },
        );
        let slice_urfdlf_parity_prune = prune_table(
            N_SLICE2 * N_URFTODLF * 2,
            &PHASE2_MOVES,
            |idx, mv| {
                let parity = idx % 2;
                let urfdlf = (idx / 2) / N_SLICE2;
                let slice = (idx / 2) % N_SLICE2;
                let new_urfdlf = usize::from(urfdlf_move[urfdlf][mv]);
                let new_slice = usize::from(frtobr_move[slice][mv]);
                let new_parity = usize::from(PARITY_MOVE[parity][mv]);
                (N_SLICE2 * new_urfdlf + new_slice) * 2 + new_parity
            },
        );
        let slice_urtodf_parity_prune = prune_table(
            N_SLICE2 * N_URTODF * 2,
            &PHASE2_MOVES,
            |idx, mv| {
                let parity = idx % 2;
                let urtodf = (idx / 2) / N_SLICE2;
                let slice = (idx / 2) % N_SLICE2;
                let new_urtodf = urtodf_move[urtodf][mv] as usize;
                let new_slice = usize::from(frtobr_move[slice][mv]);
                let new_parity = usize::from(PARITY_MOVE[parity][mv]);
                (N_SLICE2 * new_urtodf + new_slice) * 2 + new_parity
            },
        );
        debug!(
            working!("Pruning tables generated in {:.3}s"),
            prune_start.elapsed().as_secs_f64()
        );

        Tables {
            twist_move,
            flip_move,
            frtobr_move,
            urfdlf_move,
            urtodf_move,
            urtoul_move,
            ubtodf_move,
            merge_urtodf,
            slice_flip_prune,
            slice_twist_prune,
            slice_urfdlf_parity_prune,
            slice_urtodf_parity_prune,
        }
    }
}

// A coordinate family is swept by setting each value on a scratch cube
// and turning each face three times, recording the coordinate after each
// quarter turn; the fourth turn restores the face for the next one.
fn move_table(
    size: usize,
    set: impl Fn(&mut CubeState, usize),
    get: impl Fn(&CubeState) -> usize,
    multiply: impl Fn(&mut CubeState, &CubeState),
) -> Vec<[u32; N_MOVE]> {
    let mut table = vec![[0u32; N_MOVE]; size];
    let mut scratch = CubeState::default();
    for (value, row) in table.iter_mut().enumerate() {
        set(&mut scratch, value);
        for (axis, generator) in MOVE_CUBES.iter().enumerate() {
            for power in 0..3 {
                multiply(&mut scratch, generator);
                row[3 * axis + power] = get(&scratch) as u32;
            }
            multiply(&mut scratch, generator);
        }
    }
    table
}

fn narrow(table: Vec<[u32; N_MOVE]>) -> Vec<[u16; N_MOVE]> {
    table
        .into_iter()
        .map(|row| row.map(|value| u16::try_from(value).expect("coordinate fits in u16")))
        .collect()
}

/// Breadth-first fill of a pruning table: distance 0 at the goal index,
/// then each pass extends the frontier by one move from the given move
/// set until every index is reached. `0xFF` marks unvisited entries
/// during generation and never survives it.
fn prune_table(
    size: usize,
    moves: &[usize],
    next: impl Fn(usize, usize) -> usize,
) -> Box<[u8]> {
    let mut table = vec![0xFF_u8; size].into_boxed_slice();
    table[0] = 0;
    let mut done = 1;
    let mut depth = 0;
    while done < size {
        for idx in 0..size {
            if table[idx] != depth {
                continue;
            }
            for &mv in moves {
                let neighbor = next(idx, mv);
                if table[neighbor] == 0xFF {
                    table[neighbor] = depth + 1;
                    done += 1;
                }
            }
        }
        depth += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_core::cube::MoveInstance;

    #[test]
    fn test_move_tables_agree_with_cubie_moves() {
        let tables = Tables::get();
        let mut state = CubeState::default();
        // Walk a fixed path and cross-check every family against the
        // cubie-level ground truth at each step.
        for &mv in &[3usize, 0, 7, 16, 10, 5, 12, 1, 9, 14] {
            let coords_before = crate::coords::CoordCube::from_cube_state(&state);
            state = state.apply_move(MoveInstance::from_index(mv));
            let coords_after = crate::coords::CoordCube::from_cube_state(&state);
            assert_eq!(
                tables.twist_move[usize::from(coords_before.twist)][mv],
                coords_after.twist
            );
            assert_eq!(
                tables.flip_move[usize::from(coords_before.flip)][mv],
                coords_after.flip
            );
            assert_eq!(
                tables.frtobr_move[usize::from(coords_before.frbr)][mv],
                coords_after.frbr
            );
            assert_eq!(
                tables.urfdlf_move[usize::from(coords_before.urfdlf)][mv],
                coords_after.urfdlf
            );
            assert_eq!(
                tables.urtoul_move[usize::from(coords_before.urul)][mv],
                coords_after.urul
            );
            assert_eq!(
                tables.ubtodf_move[usize::from(coords_before.ubdf)][mv],
                coords_after.ubdf
            );
            assert_eq!(
                usize::from(PARITY_MOVE[usize::from(coords_before.parity)][mv]),
                usize::from(coords_after.parity)
            );
        }
    }

    #[test]
    fn test_prune_tables_are_zero_exactly_at_goal() {
        let tables = Tables::get();
        assert_eq!(tables.slice_flip_prune[0], 0);
        assert_eq!(tables.slice_twist_prune[0], 0);
        assert_eq!(tables.slice_urfdlf_parity_prune[0], 0);
        assert_eq!(tables.slice_urtodf_parity_prune[0], 0);
        // No entry is left unvisited.
        assert!(tables.slice_flip_prune.iter().all(|&d| d != 0xFF));
        assert!(tables.slice_twist_prune.iter().all(|&d| d != 0xFF));
    }

    #[test]
    fn test_prune_entries_change_by_at_most_one_per_move() {
        // Consistency of the heuristic: a single move changes the exact
        // projected distance by at most one in either direction.
        let tables = Tables::get();
        for idx in (0..N_SLICE1 * N_FLIP).step_by(977) {
            let here = tables.slice_flip_prune[idx];
            let flip = idx / N_SLICE1;
            let slice = idx % N_SLICE1;
            for mv in 0..N_MOVE {
                let new_flip = usize::from(tables.flip_move[flip][mv]);
                let new_slice = usize::from(tables.frtobr_move[slice * 24][mv]) / 24;
                let there = tables.slice_flip_prune[N_SLICE1 * new_flip + new_slice];
                assert!(here.abs_diff(there) <= 1);
            }
        }
    }

    #[test]
    fn test_merge_table_defined_for_disjoint_placements() {
        let tables = Tables::get();
        // The solved cube pairs UR..UL coordinate 0 with UB..DF
        // coordinate 114, and merges to the solved UR..DF coordinate.
        assert_eq!(tables.merge_urtodf[0][114], 0);
        // Coordinate 0 of both families claims positions 0..2 twice over,
        // which is no configuration at all.
        assert_eq!(tables.merge_urtodf[0][0], MERGE_NONE);
        // Every row has defined entries (a valid UB..DF placement exists
        // for any UR..UL placement).
        for row in &tables.merge_urtodf {
            assert!(row.iter().any(|&v| v != MERGE_NONE));
        }
    }
}

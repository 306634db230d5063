//! A module providing the structure and state of the Rubik's Cube at the
//! cubie level.
//!
//! The state of the cube is internally represented by four properties:
//! corner permutation, corner orientation, edge permutation, and edge
//! orientation. A tuple of these four properties (with correct parity
//! relations) uniquely determines the state of the cube.
//!
//! The order of the corners and edges is as follows:
//! - Corners: URF UFL ULB UBR DFR DLF DBL DRB
//! - Edges: UR UF UL UB DR DF DL DB FR FL BL BR

use std::{
    fmt::Display,
    ops::{Deref, DerefMut},
    str::FromStr,
};

use itertools::Itertools;
use strum_macros::EnumString;

pub const CORNERS: usize = 8;
pub const EDGES: usize = 12;

/// An enum for the faces of the Rubik's Cube.
///
/// - U: top face
/// - R: right face
/// - F: front face
/// - D: bottom face
/// - L: left face
/// - B: back face
///
/// The declaration order is the move-generation order of the solver: the
/// combined move index of a face turn is `3 * axis + power - 1`, where
/// `axis` is the face's position in this ordering.
#[derive(PartialEq, Eq, EnumString, Debug, Clone, Copy)]
pub enum Face {
    U,
    R,
    F,
    D,
    L,
    B,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::U, Face::R, Face::F, Face::D, Face::L, Face::B];

    /// The axis index of this face, `0..6` in declaration order.
    #[must_use]
    pub fn axis(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_axis(axis: usize) -> Face {
        Face::ALL[axis]
    }

    /// The face on the opposite side of the cube. Turns of opposite faces
    /// commute.
    #[must_use]
    pub fn opposite(self) -> Face {
        Face::ALL[(self as usize + 3) % 6]
    }
}

impl Display for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Represents the direction which to turn a face. `Prime` represents a
/// counter-clockwise rotation of a face, and `Double` represents a 180
/// degree rotation of a face.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Direction {
    Normal,
    Double,
    Prime,
}

impl Direction {
    /// The number of clockwise quarter turns this direction stands for,
    /// always in `1..=3`.
    #[must_use]
    pub fn power(self) -> usize {
        match self {
            Direction::Normal => 1,
            Direction::Double => 2,
            Direction::Prime => 3,
        }
    }

    /// The inverse of [`Direction::power`].
    ///
    /// # Panics
    ///
    /// Panics if `power` is not in `1..=3`.
    #[must_use]
    pub fn from_power(power: usize) -> Direction {
        match power {
            1 => Direction::Normal,
            2 => Direction::Double,
            3 => Direction::Prime,
            _ => panic!("turn power out of range: {power}"),
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Normal => write!(f, ""),
            Direction::Prime => write!(f, "'"),
            Direction::Double => write!(f, "2"),
        }
    }
}

/// An instantiation of a certain face equipped with a direction.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct MoveInstance {
    pub face: Face,
    pub dir: Direction,
}

impl MoveInstance {
    #[must_use]
    pub fn new(face: Face, dir: Direction) -> Self {
        Self { face, dir }
    }

    /// The combined move index `3 * axis + power - 1`, in `0..18`.
    #[must_use]
    pub fn index(self) -> usize {
        3 * self.face.axis() + self.dir.power() - 1
    }

    /// The inverse of [`MoveInstance::index`].
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self {
            face: Face::from_axis(index / 3),
            dir: Direction::from_power(index % 3 + 1),
        }
    }

    #[must_use]
    pub fn invert(self) -> Self {
        Self {
            face: self.face,
            dir: match self.dir {
                Direction::Normal => Direction::Prime,
                Direction::Prime => Direction::Normal,
                Direction::Double => Direction::Double,
            },
        }
    }
}

impl Display for MoveInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.face, self.dir)
    }
}

impl FromStr for MoveInstance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let face: Face = s
            .get(..1)
            .ok_or_else(|| "empty move".to_owned())?
            .parse()
            .map_err(|_| format!("unknown face in move {s:?}"))?;
        let dir = match &s[1..] {
            "" => Direction::Normal,
            "'" => Direction::Prime,
            "2" => Direction::Double,
            suffix => return Err(format!("unknown turn suffix {suffix:?} in move {s:?}")),
        };
        Ok(MoveInstance::new(face, dir))
    }
}

/// A shorthand macro that can be used to construct [`MoveInstance`]s.
///
/// ```
/// use cube_core::cube::{Direction, Face, MoveInstance};
/// use cube_core::cube_move;
///
/// let r_prime: MoveInstance = cube_move!(R, Prime);
/// let u2: MoveInstance = cube_move!(U, Double);
/// ```
#[macro_export]
macro_rules! cube_move {
    ($face:ident, $dir:ident) => {{
        $crate::cube::MoveInstance {
            face: $crate::cube::Face::$face,
            dir: $crate::cube::Direction::$dir,
        }
    }};
}

/// A struct representing sequences of moves, used for representing
/// scramble sequences and solution sequences.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MoveSequence(Vec<MoveInstance>);

impl MoveSequence {
    #[must_use]
    pub fn from(vec: Vec<MoveInstance>) -> Self {
        Self(vec)
    }

    #[must_use]
    pub fn invert(&self) -> Self {
        Self(self.iter().rev().map(|m| m.invert()).collect())
    }

    /// Collapses redundant adjacent moves into an equivalent, shorter
    /// sequence: same-face runs are merged (`R R R` becomes `R'`, `R R'`
    /// vanishes), and opposite-face pairs are put into a canonical order
    /// so that merges across the pair are found (`U D U2` becomes
    /// `U' D`). Running the pass twice produces the same sequence as
    /// running it once.
    #[must_use]
    pub fn collapse_redundant(&self) -> Self {
        let mut out: Vec<MoveInstance> = Vec::with_capacity(self.len());
        for &m in self.iter() {
            Self::push_collapsed(&mut out, m);
        }
        Self(out)
    }

    // Maintains the invariant that `out` is already collapsed: no two
    // adjacent same-face moves, and every adjacent opposite-face pair in
    // canonical (smaller axis first) order.
    fn push_collapsed(out: &mut Vec<MoveInstance>, m: MoveInstance) {
        // A merge candidate is the last move, or the second to last when
        // the last is on the opposite face (the two commute).
        let mut at = None;
        if let Some(last) = out.last() {
            if last.face == m.face {
                at = Some(out.len() - 1);
            } else if last.face == m.face.opposite()
                && out.len() >= 2
                && out[out.len() - 2].face == m.face
            {
                at = Some(out.len() - 2);
            }
        }
        match at {
            Some(i) => {
                let power = (out[i].dir.power() + m.dir.power()) % 4;
                if power == 0 {
                    let dropped = out.remove(i);
                    debug_assert_eq!(dropped.face, m.face);
                    // Removing a move may bring two mergeable moves
                    // together again.
                    if i < out.len() {
                        let reexposed = out.remove(i);
                        Self::push_collapsed(out, reexposed);
                    }
                } else {
                    out[i].dir = Direction::from_power(power);
                }
            }
            None => {
                out.push(m);
                // Canonicalize an opposite-face pair so a later move on
                // either face always finds its merge candidate.
                let n = out.len();
                if n >= 2
                    && out[n - 2].face == out[n - 1].face.opposite()
                    && out[n - 1].face.axis() < out[n - 2].face.axis()
                {
                    out.swap(n - 2, n - 1);
                }
            }
        }
    }
}

impl Display for MoveSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.iter().map(ToString::to_string).join(" "))
    }
}

impl FromStr for MoveSequence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_whitespace()
            .map(MoveInstance::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(MoveSequence)
    }
}

impl Deref for MoveSequence {
    type Target = Vec<MoveInstance>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for MoveSequence {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// The underlying struct for representing a configuration of the Rubik's
/// Cube.
///
/// `cp[i]` and `ep[i]` name the cubie sitting at position `i`; `co[i]`
/// (mod 3) and `eo[i]` (mod 2) give its orientation relative to the
/// solved state.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CubeState {
    pub cp: [u8; CORNERS],
    pub co: [u8; CORNERS],
    pub ep: [u8; EDGES],
    pub eo: [u8; EDGES],
}

impl Default for CubeState {
    fn default() -> CubeState {
        CubeState {
            cp: const {
                let mut arr = [0; CORNERS];
                let mut i = 0;
                while i < CORNERS {
                    arr[i] = i as u8;
                    i += 1;
                }
                arr
            },
            co: [0; CORNERS],
            ep: const {
                let mut arr = [0; EDGES];
                let mut i = 0;
                while i < EDGES {
                    arr[i] = i as u8;
                    i += 1;
                }
                arr
            },
            eo: [0; EDGES],
        }
    }
}

impl CubeState {
    /// Composes the corner layer of `self` with `other`: the result is the
    /// configuration reached by performing `self` and then `other`.
    pub fn corner_multiply(&mut self, other: &CubeState) {
        let mut cp = [0; CORNERS];
        let mut co = [0; CORNERS];
        for i in 0..CORNERS {
            cp[i] = self.cp[other.cp[i] as usize];
            co[i] = (self.co[other.cp[i] as usize] + other.co[i]) % 3;
        }
        self.cp = cp;
        self.co = co;
    }

    /// Composes the edge layer of `self` with `other`.
    pub fn edge_multiply(&mut self, other: &CubeState) {
        let mut ep = [0; EDGES];
        let mut eo = [0; EDGES];
        for i in 0..EDGES {
            ep[i] = self.ep[other.ep[i] as usize];
            eo[i] = (self.eo[other.ep[i] as usize] + other.eo[i]) % 2;
        }
        self.ep = ep;
        self.eo = eo;
    }

    fn multiply(&mut self, other: &CubeState) {
        self.corner_multiply(other);
        self.edge_multiply(other);
    }

    /// Applies a move to a Rubik's Cube configuration.
    #[must_use]
    pub fn apply_move(&self, m: MoveInstance) -> Self {
        let generator = &MOVE_CUBES[m.face.axis()];
        let mut state = self.clone();
        for _ in 0..m.dir.power() {
            state.multiply(generator);
        }
        state
    }

    /// Applies a sequence of moves, in order, to a Rubik's Cube
    /// configuration.
    #[must_use]
    pub fn apply_sequence(&self, moves: &MoveSequence) -> Self {
        moves.iter().fold(self.clone(), |acc, &m| acc.apply_move(m))
    }

    #[must_use]
    pub fn is_solved(&self) -> bool {
        *self == CubeState::default()
    }

    /// The permutation parity of the corners, `0` or `1`. A reachable
    /// configuration always has equal corner and edge parity.
    #[must_use]
    pub fn corner_parity(&self) -> u8 {
        permutation_parity(&self.cp)
    }

    /// The permutation parity of the edges, `0` or `1`.
    #[must_use]
    pub fn edge_parity(&self) -> u8 {
        permutation_parity(&self.ep)
    }

    /// Whether this configuration is reachable from the solved cube by
    /// face turns: corner twist sums to zero mod 3, edge flip sums to
    /// zero mod 2, and corner and edge permutation parities agree. A
    /// configuration assembled by hand (or corrupted) can violate any of
    /// the three.
    #[must_use]
    pub fn is_solvable(&self) -> bool {
        self.co.iter().sum::<u8>() % 3 == 0
            && self.eo.iter().sum::<u8>() % 2 == 0
            && self.corner_parity() == self.edge_parity()
    }
}

fn permutation_parity(perm: &[u8]) -> u8 {
    let mut inversions = 0;
    for i in 1..perm.len() {
        for j in 0..i {
            if perm[j] > perm[i] {
                inversions += 1;
            }
        }
    }
    inversions % 2
}

/// The six face-turn generators as cubie permutations, indexed by
/// [`Face::axis`]. `cp[i]` is the position whose occupant moves to
/// position `i` under a clockwise quarter turn.
pub const MOVE_CUBES: [CubeState; 6] = [
    // U
    CubeState {
        cp: [3, 0, 1, 2, 4, 5, 6, 7],
        co: [0, 0, 0, 0, 0, 0, 0, 0],
        ep: [3, 0, 1, 2, 4, 5, 6, 7, 8, 9, 10, 11],
        eo: [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    },
    // R
    CubeState {
        cp: [4, 1, 2, 0, 7, 5, 6, 3],
        co: [2, 0, 0, 1, 1, 0, 0, 2],
        ep: [8, 1, 2, 3, 11, 5, 6, 7, 4, 9, 10, 0],
        eo: [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    },
    // F
    CubeState {
        cp: [1, 5, 2, 3, 0, 4, 6, 7],
        co: [1, 2, 0, 0, 2, 1, 0, 0],
        ep: [0, 9, 2, 3, 4, 8, 6, 7, 1, 5, 10, 11],
        eo: [0, 1, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0],
    },
    // D
    CubeState {
        cp: [0, 1, 2, 3, 5, 6, 7, 4],
        co: [0, 0, 0, 0, 0, 0, 0, 0],
        ep: [0, 1, 2, 3, 5, 6, 7, 4, 8, 9, 10, 11],
        eo: [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    },
    // L
    CubeState {
        cp: [0, 2, 6, 3, 4, 1, 5, 7],
        co: [0, 1, 2, 0, 0, 2, 1, 0],
        ep: [0, 1, 10, 3, 4, 5, 9, 7, 8, 2, 6, 11],
        eo: [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    },
    // B
    CubeState {
        cp: [0, 1, 3, 7, 4, 5, 2, 6],
        co: [0, 0, 1, 2, 0, 0, 2, 1],
        ep: [0, 1, 2, 11, 4, 5, 6, 10, 8, 9, 3, 7],
        eo: [0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 1],
    },
];

/// A vector of all allowed moves on a Rubik's Cube, in move-index order.
pub const ALL_MOVES: [MoveInstance; 18] = [
    cube_move!(U, Normal),
    cube_move!(U, Double),
    cube_move!(U, Prime),
    cube_move!(R, Normal),
    cube_move!(R, Double),
    cube_move!(R, Prime),
    cube_move!(F, Normal),
    cube_move!(F, Double),
    cube_move!(F, Prime),
    cube_move!(D, Normal),
    cube_move!(D, Double),
    cube_move!(D, Prime),
    cube_move!(L, Normal),
    cube_move!(L, Double),
    cube_move!(L, Prime),
    cube_move!(B, Normal),
    cube_move!(B, Double),
    cube_move!(B, Prime),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn scrambled(s: &str) -> CubeState {
        CubeState::default().apply_sequence(&s.parse().unwrap())
    }

    #[test]
    fn test_four_quarter_turns_restore() {
        for face in Face::ALL {
            let mut state = CubeState::default();
            for _ in 0..4 {
                state = state.apply_move(MoveInstance::new(face, Direction::Normal));
            }
            assert!(state.is_solved(), "{face}4 should be the identity");
        }
    }

    #[test]
    fn test_sexy_move_has_order_six() {
        let sexy: MoveSequence = "R U R' U'".parse().unwrap();
        let mut state = CubeState::default();
        for i in 0..6 {
            assert_eq!(state.is_solved(), i == 0);
            state = state.apply_sequence(&sexy);
        }
        assert!(state.is_solved());
    }

    #[test]
    fn test_move_inverts_itself() {
        let seq: MoveSequence = "R U2 F' L D B2 U' R2".parse().unwrap();
        let state = CubeState::default().apply_sequence(&seq);
        assert!(!state.is_solved());
        assert!(state.apply_sequence(&seq.invert()).is_solved());
    }

    #[test]
    fn test_move_index_round_trip() {
        for (i, &m) in ALL_MOVES.iter().enumerate() {
            assert_eq!(m.index(), i);
            assert_eq!(MoveInstance::from_index(i), m);
        }
    }

    #[test]
    fn test_sequence_parse_and_display() {
        let input = "R U2 F' B2 L' D";
        let seq: MoveSequence = input.parse().unwrap();
        assert_eq!(seq.to_string(), input);
        assert!("R X".parse::<MoveSequence>().is_err());
        assert!("R3".parse::<MoveSequence>().is_err());
    }

    #[test]
    fn test_collapse_merges_same_face_runs() {
        let seq: MoveSequence = "R R R".parse().unwrap();
        assert_eq!(seq.collapse_redundant().to_string(), "R'");

        let seq: MoveSequence = "U U2 F F'".parse().unwrap();
        assert_eq!(seq.collapse_redundant().to_string(), "U'");

        let seq: MoveSequence = "R R' U D".parse().unwrap();
        assert_eq!(seq.collapse_redundant().to_string(), "U D");
    }

    #[test]
    fn test_collapse_merges_across_opposite_faces() {
        let seq: MoveSequence = "U D U2".parse().unwrap();
        assert_eq!(seq.collapse_redundant().to_string(), "U' D");

        // The D D' cancellation re-exposes the U U' pair.
        let seq: MoveSequence = "U D D' U' F".parse().unwrap();
        assert_eq!(seq.collapse_redundant().to_string(), "F");
    }

    #[test]
    fn test_collapse_preserves_semantics() {
        let seq: MoveSequence = "R R U D U2 F F2 B L' L D'".parse().unwrap();
        let collapsed = seq.collapse_redundant();
        assert_eq!(
            CubeState::default().apply_sequence(&seq),
            CubeState::default().apply_sequence(&collapsed),
        );
    }

    #[test]
    fn test_collapse_is_idempotent() {
        for scramble in ["R R R", "U D U2", "U D D' U' F", "R U R' U'", ""] {
            let collapsed = scramble.parse::<MoveSequence>().unwrap().collapse_redundant();
            assert_eq!(collapsed.collapse_redundant(), collapsed);
        }
    }

    #[test]
    fn test_scrambles_are_solvable() {
        assert!(CubeState::default().is_solvable());
        assert!(scrambled("R U2 F' L D B2").is_solvable());
    }

    #[test]
    fn test_random_walks_stay_solvable() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut state = CubeState::default();
        for _ in 0..200 {
            state = state.apply_move(ALL_MOVES[rng.usize(0..ALL_MOVES.len())]);
            assert!(state.is_solvable());
        }
    }

    #[test]
    fn test_twisted_corner_is_unsolvable() {
        let mut state = CubeState::default();
        state.co[0] = 1;
        assert!(!state.is_solvable());
    }

    #[test]
    fn test_flipped_edge_is_unsolvable() {
        let mut state = CubeState::default();
        state.eo[0] = 1;
        assert!(!state.is_solvable());
    }

    #[test]
    fn test_swapped_corner_pair_is_unsolvable() {
        let mut state = CubeState::default();
        state.cp.swap(0, 1);
        assert!(!state.is_solvable());
    }

    #[test]
    fn test_parities_agree_on_reachable_states() {
        let state = scrambled("R U F' D2 L B");
        assert_eq!(state.corner_parity(), state.edge_parity());
        assert_eq!(scrambled("R").corner_parity(), 1);
        assert_eq!(scrambled("R2").corner_parity(), 0);
    }
}

#![warn(clippy::pedantic)]
#![allow(clippy::similar_names, clippy::too_many_lines)]

pub mod cube;

pub use cube::{CubeState, Direction, Face, MoveInstance, MoveSequence};

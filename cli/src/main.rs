use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::eyre::eyre;
use cube_core::cube::{CubeState, MoveSequence};
use owo_colors::OwoColorize;
use two_phase_solver::solver::TwoPhaseSolver;

/// Solves a scrambled 3x3x3 cube with the two-phase algorithm
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// The scramble in face-turn notation, e.g. "R U2 F' L D B2"
    scramble: String,
    /// Never report a solution longer than this many moves
    #[arg(long, default_value_t = 30)]
    max_depth: usize,
    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<f64>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();
    let args = Args::parse();

    let scramble: MoveSequence = args
        .scramble
        .parse()
        .map_err(|message: String| eyre!(message))?;
    let cube = CubeState::default().apply_sequence(&scramble);

    let mut solver = TwoPhaseSolver::new().with_max_depth(args.max_depth);
    if let Some(timeout) = args.timeout {
        solver = solver.with_time_limit(Duration::from_secs_f64(timeout));
    }

    let solve_start = Instant::now();
    let solution = solver.solve(&cube)?;
    let elapsed = solve_start.elapsed();

    if solution.is_empty() {
        println!("{}", "Already solved".green());
    } else {
        println!("{}", solution.to_string().green().bold());
        println!(
            "{} moves in {:.3}s",
            solution.len().bold(),
            elapsed.as_secs_f64(),
        );
    }
    Ok(())
}

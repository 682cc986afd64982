use std::io;

use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use x86e_fibonacci::{evaluate, FIXED_INDEX};

/// Runs the example program: the exit status is the computed term.
fn main() {
    let directives = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(directives)
        .with_writer(io::stderr)
        .init();

    let term = evaluate(FIXED_INDEX);
    debug!(index = FIXED_INDEX, term, "evaluated fixed index");

    std::process::exit(term);
}

//! Runs every `test_data/*.s` program that declares `;; EXPECT_*` markers.

use x86e_runner::{run_program, RunnerOptions};
use x86e_test_utils::{list_fixtures, read_fixture, FixtureExpectation};

#[test]
fn test_fixtures() {
    let mut checked = 0;
    let mut failures = Vec::new();

    for name in list_fixtures() {
        let source = read_fixture(&name);
        let expectation = FixtureExpectation::parse(&source)
            .unwrap_or_else(|e| panic!("{name}: bad expectation markers: {e}"));
        if expectation.is_empty() {
            continue;
        }
        checked += 1;

        let output = match run_program(&source, RunnerOptions::default()) {
            Ok(output) => output,
            Err(e) => {
                failures.push(format!("{name}: {e}"));
                continue;
            }
        };
        if let Some(status) = expectation.status {
            if output.exit_status != status {
                failures.push(format!(
                    "{name}: expected status {status}, got {}",
                    output.exit_status
                ));
            }
        }
        if let Some(stdout) = &expectation.stdout {
            let actual = String::from_utf8_lossy(&output.stdout);
            if actual != *stdout {
                failures.push(format!("{name}: expected stdout {stdout:?}, got {actual:?}"));
            }
        }
    }

    assert!(checked > 0, "no fixture declares expectations");
    assert!(failures.is_empty(), "fixture failures:\n{}", failures.join("\n"));
}

#[test]
fn test_fib_fixture_exits_with_13() {
    let output = run_program(&read_fixture("fib.s"), RunnerOptions::default())
        .expect("fib.s should run");
    assert_eq!(output.exit_status, 13);
    assert_eq!(
        output.exit_status as i32,
        x86e_fibonacci::evaluate(x86e_fibonacci::FIXED_INDEX)
    );
}

/// Built-in test harness
///
/// Runs the end-to-end scenarios against a freshly cold-started system
/// per case, checking the final stack (top first), the depth, and any
/// printed output. Reached with the `test` command-line argument; the
/// exit code is the failure count.
///
use crate::errors::ForthError;
use crate::internals::console::OutputDevice;
use crate::kernel::Cell;
use crate::runtime::ForthRuntime;

pub struct TestStats {
    pub passed: u32,
    pub failed: u32,
    pub total: u32,
}

struct Scenario {
    code: &'static str,
    /// Expected stack, top first.
    stack: &'static [Cell],
    /// Expected printed output, or None to skip the check.
    output: Option<&'static str>,
    /// Whether the line is expected to abort.
    aborts: bool,
}

const SCENARIOS: &[Scenario] = &[
    Scenario { code: "10 20 +", stack: &[30], output: None, aborts: false },
    Scenario { code: "2 3 + 4 *", stack: &[20], output: None, aborts: false },
    Scenario { code: "100 25 - 30 10 +", stack: &[40, 75], output: None, aborts: false },
    Scenario { code: ": SQ DUP * ; 7 SQ", stack: &[49], output: None, aborts: false },
    Scenario {
        code: ": COUNT 5 0 DO I LOOP ; COUNT",
        stack: &[4, 3, 2, 1, 0],
        output: None,
        aborts: false,
    },
    Scenario { code: "42 UNKNOWN_WORD 100", stack: &[42], output: None, aborts: true },
    Scenario { code: "255 HEX . DECIMAL", stack: &[], output: Some("FF "), aborts: false },
    Scenario { code: ": FIZZ 3 MOD 0= ; 9 FIZZ", stack: &[-1], output: None, aborts: false },
    // beyond the core table
    Scenario { code: "1 2 SWAP", stack: &[1, 2], output: None, aborts: false },
    Scenario { code: ": E 6 0 DO I 2 +LOOP ; E", stack: &[4, 2, 0], output: None, aborts: false },
    Scenario { code: ": G .\" hi\" ; G", stack: &[], output: Some("hi"), aborts: false },
    Scenario { code: "1 0 /", stack: &[], output: None, aborts: true },
    Scenario { code: ": B BEGIN 1- DUP 0= UNTIL ; 3 B", stack: &[0], output: None, aborts: false },
];

fn fresh_system() -> Result<ForthRuntime, ForthError> {
    let mut rt = ForthRuntime::new();
    rt.out = OutputDevice::Capture(Vec::new());
    rt.cold_start()?;
    Ok(rt)
}

fn run_scenario(scenario: &Scenario, stats: &mut TestStats) {
    stats.total += 1;
    let mut rt = match fresh_system() {
        Ok(rt) => rt,
        Err(e) => {
            stats.failed += 1;
            println!("FAIL {:40} cold start failed: {e}", scenario.code);
            return;
        }
    };
    let result = rt.interpret_text(scenario.code);
    let aborted = result.is_err();
    let printed = rt.out.take_captured();

    let mut problems = Vec::new();
    if aborted != scenario.aborts {
        problems.push(format!("abort mismatch (got {aborted})"));
    }
    let mut actual: Vec<Cell> = rt.ctx.data_slice().to_vec();
    actual.reverse(); // compare top first
    if actual != scenario.stack {
        problems.push(format!("stack {actual:?}, expected {:?}", scenario.stack));
    }
    if let Some(expected) = scenario.output {
        if printed != expected {
            problems.push(format!("output {printed:?}, expected {expected:?}"));
        }
    }

    if problems.is_empty() {
        stats.passed += 1;
        println!("ok   {}", scenario.code);
    } else {
        stats.failed += 1;
        println!("FAIL {:40} {}", scenario.code, problems.join("; "));
    }
}

/// Run everything; returns the number of failures for the exit code.
pub fn run_all_tests() -> u32 {
    let mut stats = TestStats { passed: 0, failed: 0, total: 0 };
    println!("Running built-in tests...\n");
    for scenario in SCENARIOS {
        run_scenario(scenario, &mut stats);
    }
    println!("\n{} tests: {} passed, {} failed", stats.total, stats.passed, stats.failed);
    stats.failed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        assert_eq!(run_all_tests(), 0);
    }
}

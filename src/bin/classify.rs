// Benchmark adapter: attribute one pipeline run to its last active stage.
//
// Usage: classify <toolName> <exitCode|timeout> < captured-output
//
// Prints the phase label for a timeout, `error(<phase>)` for an unclean
// exit, and `done` for a clean one.

use std::io::Read;
use std::process;

use slicetest::phase::label_run;
use slicetest::process::RunResult;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (tool, outcome) = match args.as_slice() {
        [tool, outcome] => (tool, outcome),
        _ => {
            eprintln!("Usage: classify <toolName> <exitCode|timeout> < captured-output");
            process::exit(1);
        }
    };

    let (status, timed_out) = if outcome == "timeout" {
        (None, true)
    } else {
        match outcome.parse::<i32>() {
            Ok(code) => (Some(code), false),
            Err(_) => {
                eprintln!("classify: outcome must be an exit code or 'timeout'");
                process::exit(1);
            }
        }
    };

    let mut captured = String::new();
    if std::io::stdin().read_to_string(&mut captured).is_err() {
        eprintln!("classify: captured output is not valid UTF-8");
        process::exit(1);
    }

    let run = RunResult {
        status,
        stdout: captured.into_bytes(),
        stderr: Vec::new(),
        timed_out,
    };
    println!("{}", label_run(tool, &run));
}

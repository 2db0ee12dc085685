// Runner entry point.
// Usage: slicetest <testName> [setup tokens...]

use std::process;

fn main() {
    process::exit(slicetest::cli::run());
}

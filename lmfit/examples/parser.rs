//! Parse the lmfit text format, which describes a curve-fitting problem,
//! then fit that problem.
use lmfit::{Config, textual::Problem};
use std::str::FromStr;

const EPSILON: f64 = 1e-6;

fn main() {
    let file = "\
# model
polynomial(2)

# guesses
0, 0, 0

# data
-1 6
0 3
1 2
2 3
3 6
";
    let problem = Problem::from_str(file).unwrap();
    let fit = problem
        .fit(&Config::default().with_tolerance(1e-12))
        .unwrap();

    // The points lie exactly on 3 - 2x + x^2.
    assert_close(fit.parameters()[0], 3.0);
    assert_close(fit.parameters()[1], -2.0);
    assert_close(fit.parameters()[2], 1.0);
    println!("fitted {} in {} iterations", problem.model, fit.iterations());
}

#[track_caller]
fn assert_close(actual: f64, expected: f64) {
    let diff = (actual - expected).abs();
    assert!(
        diff < EPSILON,
        "expected {expected}, got {actual}, diff was {diff}"
    );
}

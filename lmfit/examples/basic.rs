//! A basic example for how to fit a model to some data.
use lmfit::{Config, CurveFit, models::ExponentialDecay};

fn main() {
    // Some measurements of a quantity decaying towards 10.
    let x = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0];
    let y = [11.02, 10.61, 10.35, 10.24, 10.12, 10.09, 10.04];

    // Rough guesses for the model's parameters: `alpha + exp(-beta*x)`.
    let guess = [8.0, 1.0];

    // Run the solver!
    let outcome = CurveFit::new(ExponentialDecay, &x, &y, &guess, &Config::default());

    // Check the outcome.
    match outcome {
        Ok(fit) => {
            let errors = fit.parameter_std_errors();
            println!("alpha = {} ± {}", fit.parameters()[0], errors[0]);
            println!("beta = {} ± {}", fit.parameters()[1], errors[1]);
            println!(
                "value at x = 4: {} ± {}",
                fit.value_at(4.0),
                fit.variance_at(4.0).sqrt()
            );
        }
        Err(e) => {
            eprintln!("lmfit could not fit this data: {}", e.error);
        }
    }
}

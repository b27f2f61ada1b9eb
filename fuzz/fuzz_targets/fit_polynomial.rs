#![no_main]

use arbitrary::Arbitrary;
use lmfit::{Config, Mode, Observations, models::Polynomial};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|setup: Setup| {
    let model = Polynomial::new(usize::from(setup.degree % 6));
    let n = setup.x.len();
    let y: Vec<f64> = setup.y.iter().copied().cycle().take(n).collect();
    let sigma: Vec<f64> = setup.sigma.iter().copied().cycle().take(n).collect();
    let observations = match setup.mode {
        Mode::Normal => Observations::normal(vec![&setup.x]),
        Mode::LeastSquares => Observations::least_squares(&y, vec![&setup.x]),
        Mode::WeightedLeastSquares => Observations::weighted(&y, &sigma, vec![&setup.x]),
    };
    let Ok(observations) = observations else {
        return;
    };
    let mut params = setup.guesses;
    params.resize(model.degree() + 1, 0.0);
    let before = params.clone();
    // Random data may never converge, so always bound the solve.
    let config = Config {
        max_iterations: Some(setup.config.max_iterations.unwrap_or(100).clamp(1, 100)),
        ..setup.config
    };
    if let Err(e) = lmfit::find_min(&model, &observations, &mut params, &config) {
        // Without a best effort, the guess is left untouched.
        if e.best.is_none() {
            let unchanged = params.iter().zip(&before).all(|(a, b)| a.to_bits() == b.to_bits());
            assert!(unchanged, "{e}");
        }
    }
});

#[derive(Debug, Arbitrary)]
struct Setup {
    degree: u8,
    mode: Mode,
    x: Vec<f64>,
    y: Vec<f64>,
    sigma: Vec<f64>,
    guesses: Vec<f64>,
    config: Config,
}

//! Benchmarks for the lmfit solver.
use std::{hint::black_box, str::FromStr};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use lmfit::{
    Config, KahanSum, Observations, find_min,
    models::{ExponentialDecay, Polynomial},
    textual::Problem,
};

/// General benchmark template.
/// Opens a given test case from the `test_cases`/ dir,
/// benchmarks fitting it.
fn bench_case(c: &mut Criterion, test_case: &'static str) {
    let txt = std::fs::read_to_string(format!("../test_cases/{test_case}/problem.md")).unwrap();
    c.bench_function(&format!("fit_{test_case}"), |b| {
        let problem = Problem::from_str(txt.as_str()).unwrap();
        b.iter(|| {
            let _actual = black_box(problem.fit(&Config::default()).unwrap());
        });
    });
}

fn fit_noisy_line(c: &mut Criterion) {
    bench_case(c, "noisy_line");
}

fn fit_exponential_decay(c: &mut Criterion) {
    bench_case(c, "exponential_decay");
}

fn fit_cubic(c: &mut Criterion) {
    bench_case(c, "cubic");
}

/// How the solve scales with the number of observations.
fn many_observations(c: &mut Criterion) {
    let mut group = c.benchmark_group("exponential_many_observations");
    for n in [10usize, 100, 1_000, 10_000] {
        let x: Vec<f64> = (0..n).map(|i| 5.0 * i as f64 / n as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, x)| 2.0 + (-1.3 * x).exp() + 0.01 * ((i % 7) as f64 - 3.0))
            .collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let observations = Observations::least_squares(&y, vec![&x]).unwrap();
            b.iter(|| {
                let mut params = [1.0, 1.0];
                let outcome = find_min(
                    &ExponentialDecay,
                    &observations,
                    &mut params,
                    &Config::default(),
                );
                black_box(outcome.unwrap())
            });
        });
    }
    group.finish();
}

/// How the solve scales with the number of parameters.
fn many_parameters(c: &mut Criterion) {
    let mut group = c.benchmark_group("polynomial_many_parameters");
    let x: Vec<f64> = (0..200).map(|i| i as f64 / 100.0 - 1.0).collect();
    for degree in [1usize, 3, 6, 10] {
        let y: Vec<f64> = x.iter().map(|x| (2.0 * x).sin()).collect();
        let model = Polynomial::new(degree);
        group.bench_with_input(BenchmarkId::from_parameter(degree), &degree, |b, _| {
            let observations = Observations::least_squares(&y, vec![&x]).unwrap();
            b.iter(|| {
                let mut params = vec![0.0; degree + 1];
                let outcome = find_min(&model, &observations, &mut params, &Config::default());
                black_box(outcome.unwrap())
            });
        });
    }
    group.finish();
}

fn compensated_sum(c: &mut Criterion) {
    let terms: Vec<f64> = (0..10_000).map(|i| 1.0 / (1.0 + i as f64)).collect();
    c.bench_function("kahan_sum_10k", |b| {
        b.iter(|| black_box(terms.iter().copied().collect::<KahanSum>().total()));
    });
}

criterion_group!(
    benches,
    fit_noisy_line,
    fit_exponential_decay,
    fit_cubic,
    many_observations,
    many_parameters,
    compensated_sum,
);
criterion_main!(benches);

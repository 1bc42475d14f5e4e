//! # Fuzzy Controller Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dbw_lib::{
    accel_ctrl::{AccelCtrl, InputData},
    fuzzy::{fuzzy_acc_ctl, FuzzyController},
};
use util::module::State;

fn fuzzy_benchmark(c: &mut Criterion) {
    let ctrl = FuzzyController::default();

    // Inputs firing rules in both small and large classes
    c.bench_function("FuzzyController::infer", |b| {
        b.iter(|| ctrl.infer(black_box(0.8), black_box(20.0)))
    });

    c.bench_function("fuzzy_acc_ctl", |b| {
        b.iter(|| fuzzy_acc_ctl(black_box(-1.2), black_box(-5.0)))
    });

    // One acceleration cycle, gas and brake loops both running
    let mut accel_ctrl = AccelCtrl::default();
    let mut t = 0.0;

    c.bench_function("AccelCtrl::proc", |b| {
        b.iter(|| {
            t += 0.1;
            accel_ctrl
                .proc(&InputData {
                    speed_mps: 5.0,
                    cmd_speed_mps: 3.0,
                    gear: 2,
                    timestamp_s: t,
                    brake_ready: true,
                    stop_requested: false,
                })
                .unwrap()
        })
    });
}

criterion_group!(benches, fuzzy_benchmark);
criterion_main!(benches);

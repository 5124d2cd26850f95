use acqopt::{
    optimize_acquisition, AcqOptConfig, AcqOptimizer, Bounds, GpPosterior, QExpectedImprovement,
    EI,
};
use ndarray::{array, Array1, Array2, Axis};

/// 6-d scenario: a smooth bowl peaking at x = 0.55 observed at 10 points.
fn training_data() -> (Array2<f64>, Array1<f64>) {
    let xt = array![
        [0.12, 0.45, 0.78, 0.33, 0.61, 0.09],
        [0.55, 0.52, 0.48, 0.60, 0.50, 0.57],
        [0.91, 0.18, 0.64, 0.72, 0.25, 0.83],
        [0.37, 0.84, 0.21, 0.15, 0.93, 0.41],
        [0.68, 0.29, 0.95, 0.51, 0.12, 0.76],
        [0.23, 0.67, 0.39, 0.88, 0.44, 0.18],
        [0.80, 0.73, 0.11, 0.42, 0.79, 0.64],
        [0.47, 0.08, 0.56, 0.97, 0.35, 0.30],
        [0.59, 0.96, 0.82, 0.26, 0.70, 0.92],
        [0.05, 0.38, 0.27, 0.69, 0.86, 0.49],
    ];
    let yt = xt.map_axis(Axis(1), |x| {
        1. - x.iter().map(|&v| (v - 0.55) * (v - 0.55)).sum::<f64>()
    });
    (xt, yt)
}

fn scenario() -> (GpPosterior, f64, Bounds) {
    let _ = env_logger::try_init();
    let (xt, yt) = training_data();
    let best_f = yt.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let gp = GpPosterior::params()
        .theta(Array1::from_elem(6, 0.8))
        .fit(&xt, &yt)
        .expect("GP conditioning");
    let bounds = Bounds::new(Array1::zeros(6), Array1::ones(6)).expect("valid bounds");
    (gp, best_f, bounds)
}

fn l2_dist(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    (a - b).iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[test]
fn test_analytic_and_mc_ei_find_the_same_candidate() {
    let (gp, best_f, bounds) = scenario();
    let config = AcqOptConfig::default().seed(42);

    let ei_res = optimize_acquisition(&EI, &gp, best_f, &bounds, &config).expect("EI maximized");
    let qei = QExpectedImprovement::new(1, 500, 0);
    let qei_res =
        optimize_acquisition(&qei, &gp, best_f, &bounds, &config).expect("qEI maximized");

    let dist = l2_dist(&ei_res.x_opt, &qei_res.x_opt);
    assert!(dist < 1e-2, "EI and qEI maximizers are {dist} apart");
    assert!(
        (ei_res.value - qei_res.value).abs() < 1e-2 * ei_res.value.max(1e-3),
        "EI value {} vs qEI value {}",
        ei_res.value,
        qei_res.value
    );
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let (gp, best_f, bounds) = scenario();
    let config = AcqOptConfig::default().seed(7);

    let first = optimize_acquisition(&EI, &gp, best_f, &bounds, &config).expect("EI maximized");
    let second = optimize_acquisition(&EI, &gp, best_f, &bounds, &config).expect("EI maximized");
    assert_eq!(first.x_opt, second.x_opt);
    assert_eq!(first.value, second.value);
}

#[test]
fn test_gradient_ascent_matches_quasi_newton_quality() {
    let (gp, best_f, bounds) = scenario();
    let reference = optimize_acquisition(
        &EI,
        &gp,
        best_f,
        &bounds,
        &AcqOptConfig::default().seed(42),
    )
    .expect("EI maximized");

    // Adaptive steps settle within the standard budget
    let adam = optimize_acquisition(
        &EI,
        &gp,
        best_f,
        &bounds,
        &AcqOptConfig::default()
            .optimizer(AcqOptimizer::Adam)
            .max_iters(100)
            .learning_rate(0.015)
            .seed(42),
    )
    .expect("EI maximized");
    let adam_dist = l2_dist(&reference.x_opt, &adam.x_opt);
    assert!(adam_dist < 6e-2, "Adam ended {adam_dist} from the EI optimum");

    // The plain rule needs a larger budget to reach the same neighborhood
    let sga = optimize_acquisition(
        &EI,
        &gp,
        best_f,
        &bounds,
        &AcqOptConfig::default()
            .optimizer(AcqOptimizer::Sga)
            .max_iters(400)
            .learning_rate(0.15)
            .seed(42),
    )
    .expect("EI maximized");
    let sga_dist = l2_dist(&reference.x_opt, &sga.x_opt);
    assert!(sga_dist < 6e-2, "plain ascent ended {sga_dist} from the EI optimum");
}

#[test]
fn test_candidates_stay_within_bounds() {
    let (gp, best_f, bounds) = scenario();
    for optimizer in [AcqOptimizer::Slsqp, AcqOptimizer::Adam, AcqOptimizer::Sga] {
        let config = AcqOptConfig::default()
            .optimizer(optimizer)
            .max_iters(50)
            .seed(3);
        let res = optimize_acquisition(&EI, &gp, best_f, &bounds, &config).expect("EI maximized");
        assert!(
            res.x_opt.iter().all(|&v| (0. ..=1.).contains(&v)),
            "candidate {:?} escaped the unit box",
            res.x_opt
        );
    }
}

#[test]
fn test_batch_qei_proposes_q_points_within_bounds() {
    let (gp, best_f, bounds) = scenario();
    let qei = QExpectedImprovement::new(2, 256, 5);
    let config = AcqOptConfig::default()
        .num_restarts(10)
        .raw_samples(50)
        .seed(11);
    let res = optimize_acquisition(&qei, &gp, best_f, &bounds, &config).expect("qEI maximized");
    assert_eq!(res.x_opt.dim(), (2, 6));
    assert!(res.x_opt.iter().all(|&v| (0. ..=1.).contains(&v)));
    assert!(res.value.is_finite() && res.value >= 0.);
}

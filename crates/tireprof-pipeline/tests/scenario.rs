use std::f64::consts::FRAC_PI_2;

use tireprof_core::{
    synthetic::{AngularCoverage, SyntheticTire},
    Aggregate, PointSet, Pt3, Vec3,
};
use tireprof_linear::RimLineError;
use tireprof_pipeline::{
    run_profile, run_profile_with, FrameError, PipelineError, ProfileInput, ProfilerConfig,
};

const TREAD_OFFSET: f64 = 0.02;
const RIM_ALPHA: f64 = 0.28;
const RIM_BETA: f64 = 0.001;

fn tire() -> SyntheticTire {
    SyntheticTire::new(
        0.3,
        Pt3::new(0.05, -0.02, 0.1),
        Vec3::new(0.2, 0.1, 1.0),
        Vec3::x(),
    )
    .unwrap()
    .with_axial_range(-0.08, 0.12)
    .with_coverage(AngularCoverage::Facing {
        half_span: FRAC_PI_2,
    })
    .with_seed(11)
}

fn rim(tire: &SyntheticTire) -> Vec<Pt3> {
    tire.rim_points(0.09, &[-0.04, -0.02, 0.0, 0.02, 0.04], RIM_ALPHA, RIM_BETA)
}

fn config() -> ProfilerConfig {
    ProfilerConfig {
        tape_width: 0.02,
        nbins: 20,
        seed: Some(2024),
        ..ProfilerConfig::default()
    }
}

#[test]
fn synthetic_tire_produces_known_profile() {
    let tire = tire();
    let input = ProfileInput {
        points: tire.sample(10_000).points().to_vec(),
        rim_points: rim(&tire),
    };
    let report = run_profile(&input, &config()).unwrap();

    assert!(
        report.cylinder.inlier_fraction > 0.95,
        "inlier fraction {}",
        report.cylinder.inlier_fraction
    );
    assert!((report.cylinder.radius - 0.3).abs() < 1e-4);
    assert!(
        report.baseline.residual_rmse < 1e-6,
        "rim rmse {}",
        report.baseline.residual_rmse
    );
    assert_eq!(report.baseline.samples, 5);
    assert_eq!(report.seed, 2024);

    let profile = &report.profile;
    assert_eq!(profile.len(), 20);
    assert!(profile.bins.windows(2).all(|w| w[0].x_center < w[1].x_center));
    assert!(profile.non_empty().count() >= 15);
    assert_eq!(profile.total_samples(), report.band_points);
    for bin in profile.non_empty() {
        let z = bin.z_prime.unwrap();
        assert!(
            (z - TREAD_OFFSET).abs() < 1e-3,
            "bin at {:.4}: z' = {z}",
            bin.x_center
        );
        assert!(bin.delta_r_mean.unwrap().abs() < 1e-3);
    }

    let m = report.frame.rotation.matrix();
    assert!((m.determinant() - 1.0).abs() < 1e-9);
    assert!(report.frame.axial_dir().cross(&tire.axis_direction()).norm() < 1e-4);
}

#[test]
fn voxelized_noisy_scan_keeps_tread_offset() {
    let tire = tire().with_radial_noise(5e-4).with_outliers(500);
    let raw = tire.sample(20_000);
    let points = raw.voxel_downsample(0.005);
    assert!(points.len() < raw.len());

    let cfg = ProfilerConfig {
        aggregate: Aggregate::Median,
        max_radial_deviation: Some(0.005),
        ..config()
    };
    let report = run_profile_with(&points, &rim(&tire), &cfg, None).unwrap();

    assert!(
        report.cylinder.inlier_fraction > 0.9,
        "inlier fraction {}",
        report.cylinder.inlier_fraction
    );
    assert!((report.cylinder.radius - 0.3).abs() < 1e-3);
    assert!(report.profile.non_empty().count() >= 12);
    for bin in report.profile.non_empty() {
        let z = bin.z_prime.unwrap();
        assert!(
            (z - TREAD_OFFSET).abs() < 2e-3,
            "bin at {:.4}: z' = {z}",
            bin.x_center
        );
        assert!(bin.delta_r_mean.unwrap().abs() < 2e-3);
    }
}

#[test]
fn ring_structured_mesh_runs_end_to_end() {
    // 40 rings of 80 vertices, each ring at one scan-space z, denser towards
    // the sensor. The first vertex of every ring is stored twice.
    let tire = SyntheticTire::new(0.3, Pt3::origin(), Vec3::z(), Vec3::x()).unwrap();
    let mut points = Vec::new();
    for ring in 0..40 {
        let axial = -0.1 + 0.2 * ring as f64 / 39.0;
        for j in 0..=80 {
            let angle = ((2 * (j % 80) + 1) as f64 / 80.0 - 1.0).asin();
            points.push(tire.point_at(axial, angle, 0.3));
        }
    }
    let scan = PointSet::new(points);
    let report = run_profile_with(&scan, &rim(&tire), &config(), None).unwrap();

    assert!((report.cylinder.radius - 0.3).abs() < 1e-4);
    assert!(report.cylinder.inlier_fraction > 0.99);
    assert!(report.profile.non_empty().count() >= 15);
    for bin in report.profile.non_empty() {
        assert!((bin.z_prime.unwrap() - TREAD_OFFSET).abs() < 1e-4);
        assert!(bin.delta_r_mean.unwrap().abs() < 1e-4);
    }
}

#[test]
fn seeded_runs_are_repeatable() {
    let tire = tire();
    let points = tire.sample(4000);
    let rim = rim(&tire);
    let a = run_profile_with(&points, &rim, &config(), None).unwrap();
    let b = run_profile_with(&points, &rim, &config(), None).unwrap();
    assert_eq!(a.cylinder, b.cylinder);
    assert_eq!(a.profile, b.profile);
}

#[test]
fn rim_count_is_checked_before_fitting() {
    let tire = tire();
    let rim = rim(&tire);
    let err = run_profile_with(&PointSet::default(), &rim[..2], &config(), None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::RimLine(RimLineError::InsufficientRimPoints { got: 2, min: 3 })
    ));

    let many: Vec<Pt3> = (0..11).map(|i| rim[i % rim.len()]).collect();
    let err = run_profile_with(&PointSet::default(), &many, &config(), None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::RimLine(RimLineError::TooManyRimPoints { got: 11, max: 10 })
    ));
}

#[test]
fn window_without_data_gives_empty_profile() {
    let tire = tire();
    let cfg = ProfilerConfig {
        axial_center: 1.0,
        ..config()
    };
    let report = run_profile_with(&tire.sample(4000), &rim(&tire), &cfg, None).unwrap();
    assert_eq!(report.band_points, 0);
    assert_eq!(report.profile.len(), 20);
    assert!(report.profile.is_empty());
}

#[test]
fn full_turn_scan_has_no_reference() {
    let tire = tire().with_coverage(AngularCoverage::Full);
    let err = run_profile_with(&tire.sample(10_000), &rim(&tire), &config(), None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Frame(FrameError::AmbiguousReference { .. })
    ));
}

#[test]
fn report_serializes() {
    let tire = tire();
    let report = run_profile_with(&tire.sample(3000), &rim(&tire), &config(), None).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["profile"]["bins"].as_array().unwrap().len(), 20);
    assert_eq!(json["seed"], 2024);
}

use super::*;

#[test]
fn disabled_configurations_share_a_fingerprint() {
    let a = StabilizationParams::default();
    let b = StabilizationParams {
        strength: 10.0,
        smoothing_radius: 3,
        ..StabilizationParams::default()
    };
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn enabled_settings_change_the_fingerprint() {
    let on = StabilizationParams {
        enabled: true,
        ..StabilizationParams::default()
    };
    assert_ne!(on.fingerprint(), StabilizationParams::default().fingerprint());
    let weaker = StabilizationParams {
        strength: 50.0,
        ..on
    };
    assert_ne!(on.fingerprint(), weaker.fingerprint());
    let mut other_model = on;
    other_model.estimator.model = crate::motion::MotionModel::Affine;
    assert_ne!(on.fingerprint(), other_model.fingerprint());
}

#[test]
fn strength_out_of_range_is_rejected() {
    let p = StabilizationParams {
        strength: 150.0,
        ..StabilizationParams::default()
    };
    assert!(p.validate().is_err());
}

#[test]
fn json_fills_in_defaults() {
    let p: StabilizationParams = serde_json::from_str(r#"{"enabled":true,"border":"mirror"}"#).unwrap();
    assert!(p.enabled);
    assert_eq!(p.strength, 100.0);
    assert_eq!(p.smoothing_radius, 15);
    assert_eq!(p.border, BorderPolicy::Mirror);
}

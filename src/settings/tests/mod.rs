use super::*;

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            kind: RegressionKind::Linear,
            accuracy: 6,
            key_bits: 512,
            alpha: 0.3,
            rounds: 40,
            regularization: RegularizationSettings {
                mode: RegularizationMode::None,
                param: 0.,
            },
        }
    }
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            label: "churn".into(),
            continuous_features: vec!["income".into()],
            reg_param: 0.,
            stop: StopCondition {
                sample_threshold: 1,
                depth_threshold: 4,
                gini_threshold: 0.,
            },
        }
    }
}

#[test]
fn test_settings_new() {
    assert!(Settings::new("configs/config.toml").is_ok());
    assert!(Settings::new("").is_err());
}

#[test]
fn test_sample_config() {
    let settings = Settings::new("configs/config.toml").unwrap();
    assert_eq!(settings.psi.curve, EcCurve::P256);
    assert_eq!(settings.aggregation.kind, RegressionKind::Logistic);
    assert_eq!(settings.aggregation.accuracy().unwrap().digits(), 6);
    assert_eq!(
        settings.aggregation.regularization.regularization(),
        Regularization::None,
    );
    assert_eq!(settings.tree.label, "churn");
    assert_eq!(settings.tree.stop.depth_threshold, 4);
}

#[test]
fn test_validate_aggregation() {
    assert!(AggregationSettings::default().validate().is_ok());

    // accuracy
    assert!(AggregationSettings {
        accuracy: 0,
        ..AggregationSettings::default()
    }
    .validate()
    .is_err());
    assert!(AggregationSettings {
        accuracy: 19,
        ..AggregationSettings::default()
    }
    .validate()
    .is_err());

    // key size
    assert!(AggregationSettings {
        key_bits: 128,
        ..AggregationSettings::default()
    }
    .validate_aggregation()
    .is_err());
    assert!(AggregationSettings {
        key_bits: 513,
        ..AggregationSettings::default()
    }
    .validate_aggregation()
    .is_err());

    // learning rate
    assert!(AggregationSettings {
        alpha: 0.,
        ..AggregationSettings::default()
    }
    .validate_aggregation()
    .is_err());
    assert!(AggregationSettings {
        alpha: f64::NAN,
        ..AggregationSettings::default()
    }
    .validate_aggregation()
    .is_err());
}

#[test]
fn test_validate_regularization() {
    let settings = RegularizationSettings {
        mode: RegularizationMode::L1,
        param: 0.5,
    };
    assert!(settings.validate_regularization().is_ok());
    assert_eq!(settings.regularization(), Regularization::L1(0.5));

    assert!(RegularizationSettings {
        mode: RegularizationMode::L2,
        param: -0.1,
    }
    .validate_regularization()
    .is_err());
}

#[test]
fn test_validate_tree() {
    assert!(TreeSettings::default().validate().is_ok());

    assert!(TreeSettings {
        label: String::new(),
        ..TreeSettings::default()
    }
    .validate()
    .is_err());
    assert!(TreeSettings {
        reg_param: -1.,
        ..TreeSettings::default()
    }
    .validate_tree()
    .is_err());
    assert!(TreeSettings {
        stop: StopCondition {
            sample_threshold: 1,
            depth_threshold: 4,
            gini_threshold: 1. + f64::EPSILON,
        },
        ..TreeSettings::default()
    }
    .validate_tree()
    .is_err());
}

//! benchlog-detect property tests

use std::collections::BTreeMap;

use benchlog_core::{Measurement, SeriesPoint};
use benchlog_detect::{Direction, RegressionDetector, SeriesPolicy, ToleranceConfig, Verdict};
use proptest::prelude::*;

fn point(value: f64, memory: Option<f64>) -> SeriesPoint {
    let mut extra = BTreeMap::new();
    if let Some(memory) = memory {
        extra.insert("memory".to_string(), memory);
    }
    SeriesPoint {
        entry_index: 0,
        commit_id: "base".to_string(),
        value,
        unit: "ns".to_string(),
        extra,
    }
}

fn config_strategy() -> impl Strategy<Value = ToleranceConfig> {
    (0.0f64..0.5, prop::option::of(0.0f64..0.5), any::<bool>(), prop::option::of(0.0f64..100.0))
        .prop_map(|(value_tolerance, memory_tolerance, smaller, absolute_threshold)| {
            let mut config = ToleranceConfig {
                value_tolerance,
                memory_tolerance,
                absolute_threshold,
                ..Default::default()
            };
            if smaller {
                config.series.insert(
                    "bench*".to_string(),
                    SeriesPolicy {
                        direction: Direction::SmallerIsWorse,
                        absolute_threshold: None,
                    },
                );
            }
            config
        })
}

proptest! {
    #[test]
    fn test_verdict_is_deterministic(
        config in config_strategy(),
        current in 0.0f64..1e6,
        baseline in 0.0f64..1e6,
        memory in prop::option::of((0.0f64..1e6, 0.0f64..1e6)),
    ) {
        let mut measurement = Measurement::new("bench/x", current, "ns");
        if let Some((now, _)) = memory {
            measurement = measurement.with_stat("memory", now);
        }
        let base = point(baseline, memory.map(|(_, before)| before));

        let first = RegressionDetector::new(config.clone()).evaluate(&measurement, Some(&base)).unwrap();
        let second = RegressionDetector::new(config).evaluate(&measurement, Some(&base)).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_no_baseline_never_regresses(config in config_strategy(), value in -1e12f64..1e12) {
        let verdict = RegressionDetector::new(config)
            .evaluate(&Measurement::new("bench/first", value, "ns"), None)
            .unwrap();
        prop_assert_eq!(verdict.verdict, Verdict::Baseline);
    }

    #[test]
    fn test_within_tolerance_is_stable(
        baseline in 1.0f64..1e6,
        fraction in -0.999f64..0.999,
    ) {
        let config = ToleranceConfig { memory_tolerance: None, ..Default::default() };
        let current = baseline * (1.0 + fraction * config.value_tolerance);
        let verdict = RegressionDetector::new(config)
            .evaluate(&Measurement::new("a", current, "ns"), Some(&point(baseline, None)))
            .unwrap();
        prop_assert_eq!(verdict.verdict, Verdict::Stable);
    }
}

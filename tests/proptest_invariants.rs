use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rating_viz::colormap::ColorNormalization;
use rating_viz::correlation::{
    compute, correlate, correlate_with_rng, CorrelationError, CorrelationMatrix, CorrelationMethod,
    CorrelationOutcome, MetricTable,
};
use rating_viz::extrema::{annotate_extrema, ExtremumKind};
use rating_viz::labels::{bar_axis_range, declutter, label_stride};
use rating_viz::series::Series;
use rating_viz::ticks::sample_ticks;
use std::collections::BTreeSet;

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn day(offset: i64) -> chrono::NaiveDateTime {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid start date");
    start + Duration::days(offset)
}

fn assert_structurally_valid(matrix: &CorrelationMatrix, size: usize) -> Result<(), TestCaseError> {
    prop_assert_eq!(matrix.size(), size);
    prop_assert!(matrix.is_symmetric());
    for i in 0..size {
        prop_assert_eq!(matrix.get(i, i), 1.0);
        for j in 0..size {
            let value = matrix.get(i, j);
            prop_assert!((-1.0..=1.0).contains(&value), "entry ({}, {}) = {}", i, j, value);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct(
            "proptest-regressions/tests/proptest_invariants.txt",
        ))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn short_series_get_no_labels_or_callouts(
        values in prop::collection::vec(-1.0e4f64..1.0e4, 0..2),
        max_labels in 0usize..30,
    ) {
        let points = values.iter().enumerate().map(|(i, v)| (day(i as i64), *v));
        let series = Series::from_points(points, None);
        let deltas = series.deltas();
        prop_assert!(declutter(deltas, max_labels, bar_axis_range(deltas)).is_empty());
        prop_assert!(annotate_extrema(&series.values()).is_empty());
    }

    #[test]
    fn series_is_sorted_with_consistent_deltas(
        rows in prop::collection::vec((0i64..60, 1000.0f64..2000.0), 0..80),
        baseline in prop::option::of(1000.0f64..2000.0),
    ) {
        let series = Series::from_points(rows.iter().map(|(d, v)| (day(*d), *v)), baseline);
        prop_assert_eq!(series.len(), rows.len());
        let points = series.points();
        for pair in points.windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        let deltas = series.deltas();
        for i in 1..points.len() {
            prop_assert_eq!(deltas[i], points[i].value - points[i - 1].value);
        }
        if let Some(first) = points.first() {
            let expected = baseline.map_or(0.0, |b| first.value - b);
            prop_assert_eq!(deltas[0], expected);
        }
    }

    #[test]
    fn references_bracket_zero_for_mixed_signs(
        positives in prop::collection::vec(0.5f64..500.0, 1..40),
        negatives in prop::collection::vec(-500.0f64..-0.5, 1..40),
        zeros in 0usize..5,
    ) {
        let mut deltas = positives.clone();
        deltas.extend(&negatives);
        deltas.extend(std::iter::repeat(0.0).take(zeros));
        let norm = ColorNormalization::from_deltas(&deltas);
        prop_assert!(norm.negative_reference <= 0.0);
        prop_assert!(norm.positive_reference >= 0.0);
        prop_assert_eq!(norm.normalize(0.0), 0.5);
    }

    #[test]
    fn repeated_positive_value_is_the_reference(
        others in prop::collection::btree_set(1i32..1000, 0..30),
        mode in 1001i32..2000,
        repeats in 2usize..6,
    ) {
        let mut deltas: Vec<f64> = others.iter().map(|v| *v as f64).collect();
        deltas.extend(std::iter::repeat(mode as f64).take(repeats));
        deltas.push(-7.0);
        let norm = ColorNormalization::from_deltas(&deltas);
        prop_assert_eq!(norm.positive_reference, mode as f64);
        prop_assert_eq!(norm.negative_reference, -7.0);
    }

    #[test]
    fn normalization_is_monotone_and_bounded(
        deltas in prop::collection::vec(-300.0f64..300.0, 1..60),
        a in -1000.0f64..1000.0,
        b in -1000.0f64..1000.0,
    ) {
        let norm = ColorNormalization::from_deltas(&deltas);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (t_lo, t_hi) = (norm.normalize(lo), norm.normalize(hi));
        prop_assert!((0.0..=1.0).contains(&t_lo));
        prop_assert!((0.0..=1.0).contains(&t_hi));
        prop_assert!(t_lo <= t_hi);
    }

    #[test]
    fn labels_follow_stride_and_never_repeat(
        deltas in prop::collection::vec(-50.0f64..50.0, 2..300),
        max_labels in 1usize..40,
    ) {
        let range = bar_axis_range(&deltas);
        let labels = declutter(&deltas, max_labels, range);
        let stride = label_stride(deltas.len(), max_labels);
        let mut texts = BTreeSet::new();
        for label in &labels {
            prop_assert_eq!(label.index % stride, 0);
            prop_assert!(texts.insert(label.text.clone()), "repeated label {}", label.text);
        }
        for pair in labels.windows(2) {
            prop_assert!(pair[0].index < pair[1].index);
        }
        let margin = 0.05 * (range.1 - range.0);
        for label in &labels {
            prop_assert!(label.y >= range.0 + margin - 1e-9 && label.y <= range.1 - margin + 1e-9);
        }
    }

    #[test]
    fn ticks_are_distinct_and_span_the_series(
        len in 2usize..500,
        max_ticks in 2usize..30,
    ) {
        let ticks = sample_ticks(len, max_ticks);
        prop_assert_eq!(ticks.len(), len.min(max_ticks));
        prop_assert_eq!(ticks.first().copied(), Some(0));
        prop_assert_eq!(ticks.last().copied(), Some(len - 1));
        for pair in ticks.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn extrema_point_at_first_max_and_min(
        values in prop::collection::vec(1000.0f64..2000.0, 2..100),
    ) {
        let callouts = annotate_extrema(&values);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        if max == min {
            prop_assert!(callouts.is_empty());
        } else {
            prop_assert_eq!(callouts.len(), 2);
            let first_max = values.iter().position(|v| *v == max);
            let first_min = values.iter().position(|v| *v == min);
            for callout in &callouts {
                match callout.kind {
                    ExtremumKind::Max => {
                        prop_assert_eq!(Some(callout.index), first_max);
                        prop_assert!(callout.text_y > callout.value);
                    }
                    ExtremumKind::Min => {
                        prop_assert_eq!(Some(callout.index), first_min);
                        prop_assert!(callout.text_y < callout.value);
                    }
                }
            }
        }
    }

    #[test]
    fn computed_matrices_are_symmetric_with_unit_diagonal(
        columns in prop::collection::vec(prop::collection::vec(-100.0f64..100.0, 12), 2..6),
        method in prop::sample::select(CorrelationMethod::ALL.to_vec()),
    ) {
        let size = columns.len();
        let table = MetricTable::from_columns(
            columns.into_iter().enumerate().map(|(i, c)| (format!("m{}", i), c)),
        );
        if let Ok(matrix) = compute(&table, method) {
            assert_structurally_valid(&matrix, size)?;
        }
    }

    #[test]
    fn degenerate_tables_fall_back_to_a_valid_matrix(
        constant in -10.0f64..10.0,
        rows in 2usize..30,
        extra_columns in 0usize..4,
        seed in any::<u64>(),
        method in prop::sample::select(CorrelationMethod::ALL.to_vec()),
    ) {
        let mut table = MetricTable::new();
        table.push_column("flat", vec![constant; rows]);
        for k in 0..extra_columns {
            table.push_column(format!("x{}", k), (0..rows).map(|r| (r * (k + 2)) as f64).collect());
        }
        let outcome = correlate_with_rng(&table, method, &mut StdRng::seed_from_u64(seed));
        prop_assert!(outcome.is_fallback());
        assert_structurally_valid(outcome.matrix(), 1 + extra_columns)?;
    }
}

#[test]
fn worked_example_series() {
    let series = Series::from_points(
        vec![
            ("2024-03-01 10:00:00", 1500.0),
            ("2024-03-02 10:00:00", 1520.0),
            ("2024-03-03 10:00:00", 1480.0),
            ("2024-03-04 10:00:00", 1480.0),
        ],
        None,
    );
    assert_eq!(series.deltas(), &[0.0, 20.0, -40.0, 0.0]);

    let norm = ColorNormalization::from_deltas(series.deltas());
    assert_eq!(norm.negative_reference, -40.0);
    assert_eq!(norm.positive_reference, 20.0);

    let callouts = annotate_extrema(&series.values());
    assert_eq!(callouts[0].kind, ExtremumKind::Max);
    assert_eq!((callouts[0].index, callouts[0].value), (1, 1520.0));
    assert_eq!(callouts[1].kind, ExtremumKind::Min);
    assert_eq!((callouts[1].index, callouts[1].value), (2, 1480.0));
    assert_eq!(series.date_label(3).as_deref(), Some("03-04"));
}

#[test]
fn label_budget_of_five_over_twenty_three_bars() {
    let deltas: Vec<f64> = (0..23).map(|i| i as f64 + 1.0).collect();
    let labels = declutter(&deltas, 5, bar_axis_range(&deltas));
    let indices: Vec<usize> = labels.iter().map(|l| l.index).collect();
    assert_eq!(indices, vec![0, 4, 8, 12, 16, 20]);
}

#[test]
fn identical_constant_columns_fall_back() {
    let table = MetricTable::from_columns(vec![("a", vec![3.0; 6]), ("b", vec![3.0; 6])]);
    for method in CorrelationMethod::ALL {
        let outcome = correlate(&table, method);
        match &outcome {
            CorrelationOutcome::Fallback { matrix, reason } => {
                assert_eq!(reason, &CorrelationError::ZeroVariance { name: "a".to_string() });
                assert_eq!(matrix.size(), 2);
                assert_eq!(matrix.get(0, 0), 1.0);
                assert_eq!(matrix.get(0, 1), matrix.get(1, 0));
            }
            CorrelationOutcome::Computed(_) => panic!("constant columns must not correlate"),
        }
    }
}

#[test]
fn seeded_fallback_is_reproducible() {
    let table = MetricTable::from_columns(vec![("only", vec![1.0, 2.0, 3.0])]);
    let method = CorrelationMethod::Pearson;
    let first = correlate_with_rng(&table, method, &mut StdRng::seed_from_u64(7));
    let second = correlate_with_rng(&table, method, &mut StdRng::seed_from_u64(7));
    assert_eq!(first, second);
    assert_eq!(
        first.fallback_reason(),
        Some(&CorrelationError::TooFewColumns { found: 1 })
    );
}

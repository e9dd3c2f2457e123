use kira_toxflow::config::Thresholds;
use kira_toxflow::deg::{DegCollector, extract_degs};
use kira_toxflow::domain::ExpressionRecord;

fn record(symbol: Option<&str>, log_fc: Option<f64>, padj: Option<f64>) -> ExpressionRecord {
    ExpressionRecord {
        gene_symbol: symbol.map(str::to_string),
        log_fc,
        padj,
    }
}

#[test]
fn union_is_independent_of_dataset_order() {
    let thresholds = Thresholds::default();
    let first = vec![
        record(Some("CYP1A1"), Some(5.0), Some(0.001)),
        record(Some("NQO1"), Some(-2.5), Some(0.01)),
    ];
    let second = vec![
        record(Some("NQO1"), Some(3.0), Some(0.02)),
        record(Some("HMOX1"), Some(2.1), Some(0.049)),
        record(Some("GADD45A"), Some(2.0), Some(0.001)),
    ];

    let mut forward = DegCollector::new();
    forward.add(extract_degs(&first, &thresholds));
    forward.add(extract_degs(&second, &thresholds));

    let mut backward = DegCollector::new();
    backward.add(extract_degs(&second, &thresholds));
    backward.add(extract_degs(&first, &thresholds));

    let mut a = forward.symbols().to_vec();
    let mut b = backward.symbols().to_vec();
    a.sort();
    b.sort();
    assert_eq!(a, vec!["CYP1A1", "HMOX1", "NQO1"]);
    assert_eq!(a, b);
}

#[test]
fn custom_thresholds_are_respected() {
    let thresholds = Thresholds {
        log_fold_change: 1.0,
        adjusted_p_value: 0.1,
    };
    let records = vec![
        record(Some("A"), Some(1.5), Some(0.09)),
        record(Some("B"), Some(1.0), Some(0.01)),
        record(Some("C"), Some(-1.01), Some(0.0999)),
    ];
    let degs = extract_degs(&records, &thresholds);
    assert_eq!(degs.symbols, vec!["A".to_string(), "C".to_string()]);
}

#[test]
fn later_datasets_only_yield_unseen_symbols() {
    let thresholds = Thresholds::default();
    let mut collector = DegCollector::new();
    let fresh = collector.add(extract_degs(
        &[record(Some("A"), Some(3.0), Some(0.01))],
        &thresholds,
    ));
    assert_eq!(fresh, vec!["A".to_string()]);

    let fresh = collector.add(extract_degs(
        &[
            record(Some("A"), Some(4.0), Some(0.01)),
            record(None, Some(4.0), Some(0.01)),
        ],
        &thresholds,
    ));
    assert!(fresh.is_empty());
    assert_eq!(collector.missing_symbols(), 1);
}

#[test]
fn blank_symbols_count_as_missing() {
    let thresholds = Thresholds::default();
    let degs = extract_degs(
        &[
            record(Some("   "), Some(3.0), Some(0.01)),
            record(Some(""), Some(-3.0), Some(0.01)),
            record(Some("GENEA"), Some(3.0), Some(0.01)),
        ],
        &thresholds,
    );
    assert_eq!(degs.symbols, vec!["GENEA".to_string()]);
    assert_eq!(degs.missing_symbols, 2);
}

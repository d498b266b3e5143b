use forecast_pipeline::error::PipelineError;
use forecast_pipeline::normalize::RawTableNormalizer;
use forecast_pipeline::table::{Cell, RawTable};
use forecast_pipeline::training::{TrainingSetBuilder, MIN_TRAINING_POINTS};
use forecast_pipeline::validate::{DataValidator, ValidatedTable};
use rstest::rstest;

fn validated(closes: Vec<Cell>) -> ValidatedTable {
    let rows = closes
        .into_iter()
        .enumerate()
        .map(|(i, close)| vec![Cell::Text(format!("2024-02-{:02}", i + 1)), close])
        .collect();
    let raw = RawTable::from_columns(vec!["Date", "Close"], rows).unwrap();
    DataValidator::default()
        .validate("TEST", &RawTableNormalizer::normalize(&raw))
        .unwrap()
}

#[rstest]
#[case(vec![Cell::Number(1.0)], 1)]
#[case(vec![Cell::Number(1.0), Cell::Text("x".to_string())], 1)]
#[case(vec![Cell::Empty, Cell::Number(1.0), Cell::Empty], 1)]
fn test_single_usable_pair_is_insufficient(#[case] closes: Vec<Cell>, #[case] usable: usize) {
    let err = TrainingSetBuilder::build(&validated(closes)).unwrap_err();
    match err {
        PipelineError::InsufficientData { required, found } => {
            assert_eq!(required, MIN_TRAINING_POINTS);
            assert_eq!(found, usable);
        }
        other => panic!("Expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn test_two_usable_pairs_succeed() {
    let set = TrainingSetBuilder::build(&validated(vec![
        Cell::Number(1.0),
        Cell::Text("bad".to_string()),
        Cell::Number(2.0),
    ]))
    .unwrap();

    assert_eq!(set.len(), 2);
    assert_eq!(set.values(), vec![1.0, 2.0]);
    assert_eq!(set.dropped_rows(), &[1]);
}

#[test]
fn test_nine_of_ten_parse() {
    let mut closes: Vec<Cell> = (0..10).map(|i| Cell::Number(100.0 + i as f64)).collect();
    closes[4] = Cell::Text("N/A".to_string());

    let set = TrainingSetBuilder::build(&validated(closes)).unwrap();
    assert_eq!(set.len(), 9);
    assert_eq!(set.dropped_rows(), &[4]);
    assert!(!set.values().contains(&104.0));
}

//! Tests for error types

use std::time::Duration;

use trueno_track::{Error, StoreError};

#[test]
fn test_shape_error() {
    let error = Error::Shape { ndim: 3 };
    let error_str = format!("{error}");
    assert!(error_str.contains("more than one dimension"));
    assert!(error_str.contains('3'));
}

#[test]
fn test_mixed_element_types_error() {
    let error = Error::MixedElementTypes;
    let error_str = format!("{error}");
    assert!(error_str.contains("same scalar kind"));
}

#[test]
fn test_empty_value_error() {
    let error = Error::EmptyValue;
    let error_str = format!("{error}");
    assert!(error_str.contains("no element type"));
}

#[test]
fn test_unsupported_type_error() {
    let error = Error::UnsupportedType("tensor of shape [9]".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("unsupported value"));
    assert!(error_str.contains("tensor of shape [9]"));
}

#[test]
fn test_experiment_exists_error() {
    let error = Error::ExperimentExists("mnist".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("experiment `mnist` already exists"));
}

#[test]
fn test_experiment_not_found_error() {
    let error = Error::ExperimentNotFound("mnist".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("experiment `mnist` does not exist"));
}

#[test]
fn test_schema_evolution_error() {
    let error = Error::SchemaEvolution {
        column: "loss".to_string(),
        attempts: 4,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("schema evolution"));
    assert!(error_str.contains("`loss`"));
    assert!(error_str.contains('4'));
}

#[test]
fn test_store_error_wraps_with_context() {
    let error = Error::from(StoreError::MissingColumn("accuracy".to_string()));
    let error_str = format!("{error}");
    assert!(error_str.contains("store error"));
    assert!(error_str.contains("no such column `accuracy`"));
    assert!(matches!(
        error,
        Error::Store(StoreError::MissingColumn(column)) if column == "accuracy"
    ));
}

#[test]
fn test_timeout_error() {
    let error = Error::Timeout {
        limit: Duration::from_millis(250),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("deadline"));
}

#[test]
fn test_only_timeouts_are_retryable() {
    assert!(Error::Timeout {
        limit: Duration::from_secs(1)
    }
    .is_retryable());

    assert!(!Error::MixedElementTypes.is_retryable());
    assert!(!Error::EmptyValue.is_retryable());
    assert!(!Error::ExperimentExists("x".to_string()).is_retryable());
    assert!(!Error::from(StoreError::Backend("boom".to_string())).is_retryable());
}

#[test]
fn test_store_error_variants_are_matchable() {
    // Typed variants replace string sniffing on backend messages.
    let missing = StoreError::MissingColumn("lr".to_string());
    assert!(matches!(missing, StoreError::MissingColumn(_)));

    let fatal = StoreError::Backend("connection reset".to_string());
    assert!(!matches!(fatal, StoreError::MissingColumn(_)));
}

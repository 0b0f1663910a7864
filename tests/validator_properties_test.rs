use serde_json::{json, Map, Value};

use recruit_extract::config::{Config, ValidatorConfig};
use recruit_extract::pipeline::normalize::{NormalizedRecord, Normalizer};
use recruit_extract::pipeline::quality_gate::{ReviewDecision, Validator};

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

/// A spread of clean, sloppy and hostile inputs
fn samples() -> Vec<Value> {
    vec![
        json!({}),
        json!({"position_name": "科员", "department_name": "某某局", "recruit_count": "5"}),
        json!({"position_name": "科员"}),
        json!({"recruit_count": "-3", "age_requirement": "40-20岁", "education_min": "小学"}),
        json!({
            "position_name": "",
            "recruit_count": 99999,
            "age_min": 70,
            "age_max": 10,
            "work_exp_years_min": 50,
            "grassroots_exp_years": 50,
            "fresh_graduate_only": "是",
            "education_min": "大专",
            "degree_required": "学士学位",
        }),
        json!({"position_name": ["a", "b"], "recruit_count": {"n": 1}, "hukou_required": "maybe"}),
    ]
}

#[test]
fn test_confidence_stays_in_bounds() {
    let validator = Validator::new();
    let normalizer = Normalizer::new();
    for sample in samples() {
        let raw = validator.validate_fields(&object(sample.clone()));
        assert!(raw.confidence <= 100, "{}", sample);

        let normalized = validator.validate(&normalizer.normalize_value(&sample));
        assert!(normalized.confidence <= 100, "{}", sample);
        assert_eq!(
            normalized.is_valid,
            normalized.errors().next().is_none() && normalized.confidence >= 85
        );
    }
}

#[test]
fn test_batch_partition_is_complete() {
    let validator = Validator::new();
    let normalizer = Normalizer::new();
    let records: Vec<NormalizedRecord> = samples()
        .iter()
        .map(|s| normalizer.normalize_value(s))
        .collect();

    for n in 0..=records.len() {
        let batch = validator.validate_batch(&records[..n]);
        assert_eq!(
            batch.valid.len() + batch.needs_review.len() + batch.invalid.len(),
            n
        );
        assert_eq!(batch.stats.total, n);
        for validated in &batch.needs_review {
            assert!(!validated.outcome.is_valid);
            assert!(validated.outcome.confidence >= 60);
        }
        for validated in &batch.invalid {
            assert!(validated.outcome.confidence < 60);
        }
    }
}

#[test]
fn test_missing_department_and_headcount() {
    let record = Normalizer::new().normalize_value(&json!({"position_name": "科员"}));
    let outcome = Validator::new().validate(&record);
    assert!(!outcome.is_valid);
    assert!(outcome.confidence <= 60);
    assert!(outcome.messages.len() >= 2);
    assert!(outcome.messages[0].contains("department_name"));
    assert!(outcome.messages[1].contains("recruit_count"));
}

#[test]
fn test_thresholds_from_config() {
    let config = Config::from_toml_str(
        r#"
        [validator]
        confidence_threshold = 70
        review_threshold = 30
        "#,
    )
    .unwrap();
    let validator = Validator::with_config(config.validator);
    let record = Normalizer::new().normalize_value(&json!({"position_name": "科员"}));
    let outcome = validator.validate(&record);
    assert_eq!(outcome.confidence, 60);
    assert_eq!(validator.decide(&outcome), ReviewDecision::NeedsReview);

    let strict = Validator::with_config(ValidatorConfig {
        review_threshold: 80,
        ..Default::default()
    });
    assert_eq!(strict.decide(&outcome), ReviewDecision::Reject);
}

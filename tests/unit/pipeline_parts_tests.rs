/*!
 * Tests for deduplication, batching and line validation
 */

use subtrans::app_config::ValidationConfig;
use subtrans::translation::batch::make_batches;
use subtrans::translation::dedup::{expand, reduce};
use subtrans::translation::quality::{QualityValidator, Rejection};

use crate::common::lines;

#[test]
fn test_reduceExpand_shouldPreserveLengthAndEquality() {
    let input = lines(&["Yeah.", "What?", " Yeah. ", "No.", "What?"]);
    let set = reduce(&input);

    assert_eq!(set.unique, lines(&["Yeah.", "What?", "No."]));
    assert_eq!(set.duplicate_count(), 2);

    let translated = lines(&["Ouais.", "Quoi ?", "Non."]);
    let out = expand(&translated, &set.index_map);
    assert_eq!(out, lines(&["Ouais.", "Quoi ?", "Ouais.", "Non.", "Quoi ?"]));
}

#[test]
fn test_reduce_withEmptyInput_shouldBeEmpty() {
    let set = reduce::<String>(&[]);
    assert!(set.is_empty());
    assert!(expand(&[], &set.index_map).is_empty());
}

#[test]
fn test_makeBatches_shouldRespectBothBounds() {
    let unique: Vec<String> = (0..20).map(|i| format!("line number {:02}", i)).collect();
    let batches = make_batches(&unique, 8, 60).unwrap();

    for batch in &batches {
        assert!(batch.len() <= 8);
        assert!(batch.char_count() <= 60);
        let numbers: Vec<usize> = batch.members.iter().map(|m| m.number).collect();
        assert_eq!(numbers, (1..=batch.len()).collect::<Vec<_>>());
    }
    let total: usize = batches.iter().map(|b| b.len()).sum();
    assert_eq!(total, 20);
}

#[test]
fn test_makeBatches_withOversizedLine_shouldIsolateIt() {
    let unique = lines(&["short", &"x".repeat(50), "tiny"]);
    let batches = make_batches(&unique, 8, 20).unwrap();

    assert_eq!(batches.len(), 3);
    assert_eq!(batches[1].canonical_indices(), vec![1]);
    assert_eq!(batches[1].char_count(), 50);
}

#[test]
fn test_validator_echoedProperNoun_shouldBeRejected() {
    let validator = QualityValidator::default();
    assert_eq!(validator.check("Tokyo", "Tokyo"), Err(Rejection::Identical));
    assert!(!validator.accept("Tokyo", " tokyo "));
}

#[test]
fn test_validator_lengthRatio_shouldOnlyApplyToLongerSources() {
    let validator = QualityValidator::default();
    assert!(matches!(
        validator.check("This sentence is fairly long indeed.", "Oui."),
        Err(Rejection::TooShort { .. })
    ));
    assert!(validator.accept("Yes.", "Oui, bien sûr, absolument."));
}

#[test]
fn test_validator_artifactPrefix_shouldBeRejected() {
    let validator = QualityValidator::default();
    assert!(matches!(
        validator.check("Good morning", "Here is the translation: Bonjour"),
        Err(Rejection::Artifact(_))
    ));
}

#[test]
fn test_validator_forNonCjkTarget_shouldRejectCjkOutput() {
    let validator = QualityValidator::default().for_target("fr");
    assert_eq!(validator.check("Thank you", "谢谢你"), Err(Rejection::UnexpectedScript));

    let validator = QualityValidator::default().for_target("ja");
    assert!(validator.accept("Thank you", "ありがとう"));
}

#[test]
fn test_validator_withInvalidRatios_shouldFailConstruction() {
    let config = ValidationConfig {
        min_length_ratio: 5.0,
        max_length_ratio: 1.0,
        ..ValidationConfig::default()
    };
    assert!(QualityValidator::new(&config).is_err());
}

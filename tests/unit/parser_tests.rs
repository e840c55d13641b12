/*!
 * Tests for numbered response parsing
 */

use subtrans::app_config::PipelineConfig;
use subtrans::translation::parser::{self, BatchResponseParser, NoResultReason, ParseOutcome, clean_response};

fn numbered(found: &[usize]) -> String {
    found
        .iter()
        .map(|n| format!("{}. translated line {}", n, n))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_parse_withEightOfTen_shouldBeParsedWithTwoGaps() {
    match parser::parse(&numbered(&[1, 2, 3, 4, 6, 7, 8, 10]), 10) {
        ParseOutcome::Parsed(parsed) => {
            assert_eq!(parsed.entries.len(), 8);
            assert_eq!(parsed.missing(), vec![5, 9]);
            assert!((parsed.found_ratio() - 0.8).abs() < f64::EPSILON);
        }
        other => panic!("expected Parsed, got {:?}", other),
    }
}

#[test]
fn test_parse_withSevenOfTen_shouldBeParsed() {
    assert!(matches!(
        parser::parse(&numbered(&[1, 2, 3, 4, 5, 6, 7]), 10),
        ParseOutcome::Parsed(_)
    ));
}

#[test]
fn test_parse_withSixOfTen_shouldBeTooManyMissing() {
    assert!(matches!(
        parser::parse(&numbered(&[1, 2, 3, 4, 5, 6]), 10),
        ParseOutcome::NoResult { found: 6, reason: NoResultReason::TooManyMissing, .. }
    ));
}

#[test]
fn test_parse_withFourOfTen_shouldBeFormatIgnored() {
    assert!(matches!(
        parser::parse(&numbered(&[1, 2, 3, 4]), 10),
        ParseOutcome::NoResult { found: 4, reason: NoResultReason::FormatIgnored, .. }
    ));
}

#[test]
fn test_parse_withPreambleAndQuotes_shouldIgnorePreambleAndStripQuotes() {
    let raw = "Sure! Here are the translations:\n\n1. \"Bonjour\"\n2. « Au revoir »";
    match parser::parse(raw, 2) {
        ParseOutcome::Parsed(parsed) => {
            assert_eq!(parsed.get(1), Some("Bonjour"));
            assert_eq!(parsed.get(2), Some("Au revoir"));
        }
        other => panic!("expected Parsed, got {:?}", other),
    }
}

#[test]
fn test_parse_withCustomThresholds_shouldApplyThem() {
    let config = PipelineConfig {
        min_found_ratio: 0.5,
        usable_found_ratio: 0.5,
        ..PipelineConfig::default()
    };
    let parser = BatchResponseParser::from_config(&config).unwrap();
    assert!(matches!(parser.parse(&numbered(&[1, 2]), 4), ParseOutcome::Parsed(_)));
}

#[test]
fn test_new_withMisorderedThresholds_shouldFail() {
    assert!(BatchResponseParser::new(0.9, 0.5).is_err());
    assert!(BatchResponseParser::new(0.0, 0.5).is_err());
}

#[test]
fn test_cleanResponse_shouldStripLabelAndEntities() {
    assert_eq!(clean_response("Translation: Tom &amp; Jerry"), "Tom & Jerry");
    assert_eq!(clean_response("  Wait......  what?  "), "Wait... what?");
}

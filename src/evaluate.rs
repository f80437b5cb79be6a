use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::model::ElementKind;

/// Human-annotated correct element-to-question mapping for one page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundTruth {
    pub image_id: String,
    pub questions: Vec<GroundTruthQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundTruthQuestion {
    pub question_id: u32,
    pub elements: Vec<GroundTruthElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroundTruthElement {
    pub element_id: String,
    pub kind: ElementKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccuracyReport {
    pub overall_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub correct: usize,
    pub incorrect: usize,
    pub missing: usize,
    pub total_expected: usize,
    pub per_question: BTreeMap<u32, f64>,
    pub per_kind: BTreeMap<ElementKind, f64>,
}

/// Scores a final assignment against ground truth. Predictions for
/// elements absent from ground truth count against precision. Empty
/// inputs yield an all-zero report, never an error.
pub fn calculate_accuracy(
    ground_truth: &GroundTruth,
    actual: &BTreeMap<String, u32>,
) -> AccuracyReport {
    let mut correct = 0;
    let mut incorrect = 0;
    let mut missing = 0;
    let mut total_expected = 0;

    let mut question_counts: BTreeMap<u32, (usize, usize)> = BTreeMap::new();
    let mut kind_counts: BTreeMap<ElementKind, (usize, usize)> = BTreeMap::new();

    for question in &ground_truth.questions {
        for element in &question.elements {
            total_expected += 1;
            let q_entry = question_counts.entry(question.question_id).or_default();
            let k_entry = kind_counts.entry(element.kind).or_default();
            q_entry.1 += 1;
            k_entry.1 += 1;

            match actual.get(&element.element_id) {
                None => missing += 1,
                Some(&assigned) if assigned == question.question_id => {
                    correct += 1;
                    q_entry.0 += 1;
                    k_entry.0 += 1;
                }
                Some(_) => incorrect += 1,
            }
        }
    }

    let precision = ratio(correct, actual.len());
    let recall = ratio(correct, total_expected);
    let f1_score = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    AccuracyReport {
        overall_accuracy: recall,
        precision,
        recall,
        f1_score,
        correct,
        incorrect,
        missing,
        total_expected,
        per_question: question_counts
            .into_iter()
            .map(|(q, (hit, total))| (q, ratio(hit, total)))
            .collect(),
        per_kind: kind_counts
            .into_iter()
            .map(|(kind, (hit, total))| (kind, ratio(hit, total)))
            .collect(),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn gt_element(id: &str, kind: ElementKind) -> GroundTruthElement {
        GroundTruthElement {
            element_id: id.to_string(),
            kind,
        }
    }

    fn two_question_truth() -> GroundTruth {
        GroundTruth {
            image_id: "sheet-1".to_string(),
            questions: vec![
                GroundTruthQuestion {
                    question_id: 1,
                    elements: vec![
                        gt_element("a", ElementKind::Text),
                        gt_element("b", ElementKind::Figure),
                    ],
                },
                GroundTruthQuestion {
                    question_id: 2,
                    elements: vec![
                        gt_element("c", ElementKind::Text),
                        gt_element("d", ElementKind::Table),
                    ],
                },
            ],
        }
    }

    #[test]
    fn scores_partial_match() {
        // 4 expected, 3 predictions, all 3 correct, 1 missing.
        let truth = two_question_truth();
        let actual: BTreeMap<String, u32> = [
            ("a".to_string(), 1),
            ("b".to_string(), 1),
            ("c".to_string(), 2),
        ]
        .into();

        let report = calculate_accuracy(&truth, &actual);
        assert_eq!(report.correct, 3);
        assert_eq!(report.incorrect, 0);
        assert_eq!(report.missing, 1);
        assert_eq!(report.total_expected, 4);
        assert_eq!(report.precision, 1.0);
        assert_eq!(report.recall, 0.75);
        assert_eq!(report.overall_accuracy, 0.75);
        assert!((report.f1_score - 6.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn per_question_and_per_kind_breakdowns() {
        let truth = two_question_truth();
        let actual: BTreeMap<String, u32> = [
            ("a".to_string(), 1),
            ("b".to_string(), 2), // wrong question
            ("c".to_string(), 2),
            ("d".to_string(), 2),
        ]
        .into();

        let report = calculate_accuracy(&truth, &actual);
        assert_eq!(report.per_question.get(&1), Some(&0.5));
        assert_eq!(report.per_question.get(&2), Some(&1.0));
        assert_eq!(report.per_kind.get(&ElementKind::Text), Some(&1.0));
        assert_eq!(report.per_kind.get(&ElementKind::Figure), Some(&0.0));
        assert_eq!(report.per_kind.get(&ElementKind::Table), Some(&1.0));
    }

    #[test]
    fn unexpected_predictions_lower_precision() {
        let truth = GroundTruth {
            image_id: "sheet-2".to_string(),
            questions: vec![GroundTruthQuestion {
                question_id: 1,
                elements: vec![gt_element("a", ElementKind::Text)],
            }],
        };
        let actual: BTreeMap<String, u32> =
            [("a".to_string(), 1), ("phantom".to_string(), 1)].into();

        let report = calculate_accuracy(&truth, &actual);
        assert_eq!(report.precision, 0.5);
        assert_eq!(report.recall, 1.0);
    }

    #[test]
    fn empty_ground_truth_yields_zero_metrics() {
        let truth = GroundTruth {
            image_id: "empty".to_string(),
            questions: vec![],
        };
        let report = calculate_accuracy(&truth, &BTreeMap::new());
        assert_eq!(report, AccuracyReport::default());
    }
}

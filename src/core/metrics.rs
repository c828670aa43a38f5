use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut matrix = Self::default();
        for (&actual, &predicted) in y_true.iter().zip(y_pred) {
            match (actual, predicted) {
                (0, 0) => matrix.true_negative += 1,
                (0, _) => matrix.false_positive += 1,
                (_, 0) => matrix.false_negative += 1,
                _ => matrix.true_positive += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub class: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Test-split evaluation stored alongside the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub loss: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
    pub classes: Vec<ClassReport>,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl EvaluationMetrics {
    /// Positive-class metrics; zero denominators yield 0.
    pub fn from_predictions(y_true: &[u8], y_pred: &[u8], loss: f64) -> Self {
        let cm = ConfusionMatrix::from_labels(y_true, y_pred);

        let precision = ratio(cm.true_positive, cm.true_positive + cm.false_positive);
        let recall = ratio(cm.true_positive, cm.true_positive + cm.false_negative);
        let negative_precision = ratio(cm.true_negative, cm.true_negative + cm.false_negative);
        let negative_recall = ratio(cm.true_negative, cm.true_negative + cm.false_positive);

        let classes = vec![
            ClassReport {
                class: 0,
                precision: negative_precision,
                recall: negative_recall,
                f1: f1_score(negative_precision, negative_recall),
                support: cm.true_negative + cm.false_positive,
            },
            ClassReport {
                class: 1,
                precision,
                recall,
                f1: f1_score(precision, recall),
                support: cm.true_positive + cm.false_negative,
            },
        ];

        Self {
            loss,
            accuracy: ratio(cm.true_positive + cm.true_negative, cm.total()),
            precision,
            recall,
            f1: f1_score(precision, recall),
            confusion: cm,
            classes,
        }
    }

    pub fn report_table(&self) -> String {
        let mut out = format!(
            "{:>12} {:>10} {:>10} {:>10} {:>10}\n",
            "", "precision", "recall", "f1-score", "support"
        );
        for c in &self.classes {
            out.push_str(&format!(
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}\n",
                c.class, c.precision, c.recall, c.f1, c.support
            ));
        }
        out.push_str(&format!(
            "{:>12} {:>10} {:>10} {:>10.2} {:>10}\n",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.confusion.total()
        ));
        out
    }
}

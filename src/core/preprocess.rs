use crate::domain::features::{Feature, FEATURE_COUNT};
use crate::domain::model::{ColumnImputation, ImputationSummary, PatientRecord};
use crate::utils::error::{Result, RiskError};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Columns where a recorded 0 is physiologically impossible and marks a missing value.
pub const DEFAULT_ZERO_AS_MISSING: [Feature; 5] = [
    Feature::Glucose,
    Feature::BloodPressure,
    Feature::SkinThickness,
    Feature::Insulin,
    Feature::Bmi,
];

/// 解析 CSV：8 個特徵欄位 + outcome
pub fn parse_dataset(bytes: &[u8], has_headers: bool) -> Result<Vec<PatientRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let line = index + 1;

        if row.len() != FEATURE_COUNT + 1 {
            return Err(RiskError::ProcessingError {
                message: format!(
                    "row {}: expected {} columns, found {}",
                    line,
                    FEATURE_COUNT + 1,
                    row.len()
                ),
            });
        }

        let mut features = [0.0; FEATURE_COUNT];
        for (i, feature) in Feature::ALL.iter().enumerate() {
            let cell = &row[i];
            features[i] = cell
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| RiskError::ProcessingError {
                    message: format!(
                        "row {}: {} value '{}' is not a number",
                        line,
                        feature.name(),
                        cell
                    ),
                })?;
        }

        let outcome = match row[FEATURE_COUNT].parse::<f64>() {
            Ok(v) if v == 0.0 => 0,
            Ok(v) if v == 1.0 => 1,
            _ => {
                return Err(RiskError::ProcessingError {
                    message: format!(
                        "row {}: outcome '{}' must be 0 or 1",
                        line,
                        &row[FEATURE_COUNT]
                    ),
                })
            }
        };

        records.push(PatientRecord { features, outcome });
    }

    if records.is_empty() {
        return Err(RiskError::DatasetError {
            message: "dataset contains no rows".to_string(),
        });
    }

    Ok(records)
}

/// Median of the values; the mean of the two middle values for even counts.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Replace zeros in `columns` by the median of that column's non-zero values.
pub fn impute_zero_as_missing(
    records: &mut [PatientRecord],
    columns: &[Feature],
) -> Result<ImputationSummary> {
    let mut summary = ImputationSummary::default();

    for &feature in columns {
        let idx = feature.index();
        let mut present: Vec<f64> = records
            .iter()
            .map(|r| r.features[idx])
            .filter(|&v| v != 0.0)
            .collect();
        let missing = records.len() - present.len();

        let median = median(&mut present).ok_or_else(|| RiskError::ProcessingError {
            message: format!("column '{}' has no recorded values", feature.name()),
        })?;

        for record in records.iter_mut() {
            if record.features[idx] == 0.0 {
                record.features[idx] = median;
            }
        }

        tracing::debug!(
            "Imputed {} missing '{}' values with median {}",
            missing,
            feature.name(),
            median
        );
        summary.columns.push(ColumnImputation {
            feature,
            missing,
            median,
        });
    }

    Ok(summary)
}

/// Class counts as `(negatives, positives)`.
pub fn class_distribution(records: &[PatientRecord]) -> (usize, usize) {
    let positives = records.iter().filter(|r| r.outcome == 1).count();
    (records.len() - positives, positives)
}

/// Seeded split that keeps the class ratio in both partitions.
pub fn stratified_split(
    records: &[PatientRecord],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<PatientRecord>, Vec<PatientRecord>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(RiskError::ProcessingError {
            message: format!("test_size must be within (0, 1), got {}", test_size),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<PatientRecord> = records
            .iter()
            .filter(|r| r.outcome == class)
            .copied()
            .collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);

        // 每個類別至少保留一筆在訓練集
        let n_test = ((members.len() as f64) * test_size).round() as usize;
        let n_test = n_test.min(members.len() - 1);
        let rest = members.split_off(n_test);
        test.extend(members);
        train.extend(rest);
    }

    if test.is_empty() {
        return Err(RiskError::ProcessingError {
            message: format!(
                "test_size {} leaves no test rows for {} records",
                test_size,
                records.len()
            ),
        });
    }

    // 打散類別順序，避免 validation split 只取到單一類別
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok((train, test))
}

pub fn to_matrix(records: &[PatientRecord]) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((records.len(), FEATURE_COUNT), |(i, j)| {
        records[i].features[j]
    });
    let y = records.iter().map(|r| r.outcome as f64).collect();
    (x, y)
}

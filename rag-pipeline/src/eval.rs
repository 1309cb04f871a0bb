//! Retrieval evaluation: micro-averaged precision, recall and F1.
//!
//! Ground truth: `[{"id": 1, "relevant": [0, 2, 5]}, ...]`
//! Predictions:  `[{"id": 1, "predicted": [0, 3, 5]}, ...]`
//!
//! For each ground-truth query the relevant and predicted chunk ids are
//! compared over their union; counts are summed across queries before the
//! ratios are taken. Queries missing from the predictions count as an empty
//! prediction; predictions for unknown queries are ignored. A zero
//! denominator yields `0.0`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Deserialize)]
struct GroundTruthEntry {
    id: u64,
    relevant: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct PredictionEntry {
    id: u64,
    predicted: Vec<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

pub type IdSets = BTreeMap<u64, Vec<u64>>;

pub fn parse_ground_truth(json: &str) -> Result<IdSets, PipelineError> {
    let items: Vec<GroundTruthEntry> = serde_json::from_str(json)?;
    Ok(items.into_iter().map(|e| (e.id, e.relevant)).collect())
}

pub fn parse_predictions(json: &str) -> Result<IdSets, PipelineError> {
    let items: Vec<PredictionEntry> = serde_json::from_str(json)?;
    Ok(items.into_iter().map(|e| (e.id, e.predicted)).collect())
}

pub fn load_ground_truth(path: &Path) -> Result<IdSets, PipelineError> {
    parse_ground_truth(&std::fs::read_to_string(path)?)
}

pub fn load_predictions(path: &Path) -> Result<IdSets, PipelineError> {
    parse_predictions(&std::fs::read_to_string(path)?)
}

pub fn compute_metrics(ground_truth: &IdSets, predictions: &IdSets) -> Metrics {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);

    for (query, relevant) in ground_truth {
        let relevant: BTreeSet<u64> = relevant.iter().copied().collect();
        let predicted: BTreeSet<u64> = predictions
            .get(query)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();

        tp += relevant.intersection(&predicted).count();
        fp += predicted.difference(&relevant).count();
        fn_ += relevant.difference(&predicted).count();
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Metrics {
        precision,
        recall,
        f1,
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

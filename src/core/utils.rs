use std::{
    collections::HashMap,
    hash::Hash,
};

pub fn fmean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn fmin(values: &[f32]) -> f32 {
    values.iter().copied().reduce(f32::min).unwrap_or(0.0)
}

pub fn fmax(values: &[f32]) -> f32 {
    values.iter().copied().reduce(f32::max).unwrap_or(0.0)
}

pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Maps each value to its dense position among the distinct values (higher value, higher
/// score). Equal values share a score; the best gets 1.0 and the worst 1/n.
///
/// `{a: 2, b: 1, c: 1, d: 0.5}` becomes `{a: 1, b: 2/3, c: 2/3, d: 1/3}`.
pub fn normalize_positional_with_ties<K: Clone + Eq + Hash>(
    values: &HashMap<K, f32>,
) -> HashMap<K, f32> {
    let mut distinct: Vec<f32> = values.values().copied().collect();
    distinct.sort_by(|a, b| b.total_cmp(a));
    distinct.dedup();

    let total = distinct.len() as f32;
    values
        .iter()
        .map(|(key, value)| {
            let position = distinct
                .binary_search_by(|probe| value.total_cmp(probe))
                .unwrap_or_else(|insert_at| insert_at);
            (key.clone(), (total - position as f32) / total)
        })
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// z-score, logistic squash, then rescale to [0,1] with the best value at 1.
///
/// Returns `None` when all values are equal; such a factor carries no ordering signal.
pub fn standardize(values: &[f32]) -> Option<Vec<f32>> {
    if values.len() < 2 {
        return None;
    }
    let mean = fmean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
    let std_dev = variance.sqrt();
    if std_dev <= f32::EPSILON {
        return None;
    }

    let squashed: Vec<f32> = values.iter().map(|v| sigmoid((v - mean) / std_dev)).collect();
    let low = fmin(&squashed);
    let shifted: Vec<f32> = squashed.iter().map(|v| v - low).collect();
    let high = fmax(&shifted);
    if high <= 0.0 {
        return None;
    }
    Some(shifted.into_iter().map(|v| clamp_unit(v / high)).collect())
}

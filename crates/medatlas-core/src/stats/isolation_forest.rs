//! Isolation Forest
//!
//! Unsupervised anomaly scoring by mean isolation path length across random
//! trees. Seeded RNG: the same corpus always yields the same outlier set, so
//! re-running a query is idempotent.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Number of trees in the ensemble
const N_TREES: usize = 100;

/// Per-tree subsample size cap
const SAMPLE_SIZE: usize = 256;

/// Fixed seed; reports must be deterministic run-to-run
const FOREST_SEED: u64 = 0x6d65_6461;

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

enum Node {
    Split { feature: usize, threshold: f64, left: Box<Node>, right: Box<Node> },
    Leaf { size: usize },
}

/// Average unsuccessful-search path length in a BST of n nodes
fn c_factor(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

fn build_tree(
    data: &[Vec<f64>],
    indices: &mut Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut SmallRng,
) -> Node {
    if indices.len() <= 1 || depth >= max_depth {
        return Node::Leaf { size: indices.len() };
    }

    // candidate features with spread left to split on
    let dims = data[0].len();
    let splittable: Vec<(usize, f64, f64)> = (0..dims)
        .filter_map(|f| {
            let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &i| {
                (acc.0.min(data[i][f]), acc.1.max(data[i][f]))
            });
            (max > min).then_some((f, min, max))
        })
        .collect();

    if splittable.is_empty() {
        return Node::Leaf { size: indices.len() };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(min..max);

    let (mut left, mut right): (Vec<usize>, Vec<usize>) =
        indices.drain(..).partition(|&i| data[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(data, &mut left, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(data, &mut right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, point: &[f64], depth: f64) -> f64 {
    match node {
        Node::Leaf { size } => depth + c_factor(*size),
        Node::Split { feature, threshold, left, right } => {
            if point[*feature] < *threshold {
                path_length(left, point, depth + 1.0)
            } else {
                path_length(right, point, depth + 1.0)
            }
        }
    }
}

/// An ensemble of isolation trees fitted over feature vectors
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit the forest. Returns `None` for an empty dataset.
    pub fn fit(data: &[Vec<f64>]) -> Option<Self> {
        if data.is_empty() || data[0].is_empty() {
            return None;
        }
        let mut rng = SmallRng::seed_from_u64(FOREST_SEED);
        let sample_size = data.len().min(SAMPLE_SIZE);
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..N_TREES)
            .map(|_| {
                let mut indices =
                    rand::seq::index::sample(&mut rng, data.len(), sample_size).into_vec();
                build_tree(data, &mut indices, 0, max_depth, &mut rng)
            })
            .collect();

        Some(Self { trees, sample_size })
    }

    /// Anomaly score in (0, 1); higher is more anomalous
    pub fn score(&self, point: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| path_length(tree, point, 0.0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let norm = c_factor(self.sample_size);
        if norm <= 0.0 {
            return 0.5;
        }
        2.0_f64.powf(-mean_path / norm)
    }

    /// Indices of the `ceil(contamination * n)` highest-scoring rows
    pub fn outliers(&self, data: &[Vec<f64>], contamination: f64) -> Vec<usize> {
        let n_flagged = ((data.len() as f64 * contamination).ceil() as usize).min(data.len());
        if n_flagged == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f64)> =
            data.iter().enumerate().map(|(i, row)| (i, self.score(row))).collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0))
        });
        let mut flagged: Vec<usize> = scored.into_iter().take(n_flagged).map(|(i, _)| i).collect();
        flagged.sort_unstable();
        flagged
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Tight cluster around the origin plus one extreme point
    fn data_with_outlier() -> Vec<Vec<f64>> {
        let mut data: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                let t = i as f64;
                vec![(t * 0.37).sin() * 0.5 + 5.0, (t * 0.73).cos() * 0.5 + 5.0]
            })
            .collect();
        data.push(vec![50.0, -40.0]);
        data
    }

    #[test]
    fn test_outlier_scores_highest() {
        let data = data_with_outlier();
        let forest = IsolationForest::fit(&data).unwrap();
        let outlier_score = forest.score(&data[60]);
        let max_inlier = data[..60]
            .iter()
            .map(|row| forest.score(row))
            .fold(0.0_f64, f64::max);
        assert!(outlier_score > max_inlier, "{outlier_score} <= {max_inlier}");
    }

    #[test]
    fn test_outliers_contains_injected_point() {
        let data = data_with_outlier();
        let forest = IsolationForest::fit(&data).unwrap();
        let flagged = forest.outliers(&data, 0.05);
        assert!(flagged.contains(&60));
        // ceil(61 * 0.05) = 4
        assert_eq!(flagged.len(), 4);
    }

    #[test]
    fn test_deterministic_across_fits() {
        let data = data_with_outlier();
        let a = IsolationForest::fit(&data).unwrap().outliers(&data, 0.05);
        let b = IsolationForest::fit(&data).unwrap().outliers(&data, 0.05);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_data() {
        assert!(IsolationForest::fit(&[]).is_none());
    }

    #[test]
    fn test_constant_data_does_not_panic() {
        let data = vec![vec![1.0, 1.0]; 20];
        let forest = IsolationForest::fit(&data).unwrap();
        let flagged = forest.outliers(&data, 0.05);
        assert_eq!(flagged.len(), 1); // ceil(20 * 0.05)
    }
}

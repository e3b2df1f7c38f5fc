//! CART regression tree
//!
//! Splits minimise the summed squared error of the two children. Thresholds
//! sit halfway between adjacent distinct feature values and rows go left when
//! `x <= threshold`. Tree ensembles fit trees on index lists so bootstrap
//! samples (with repeated rows) need no copying of the feature matrix.

use super::{check_columns, check_training_data, normalize};
use crate::{Result, TransferError};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Growth limits for a single tree
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered at each split; all when `None`
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 0,
        }
    }
}

impl TreeParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(TransferError::Config(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf < 1 {
            return Err(TransferError::Config(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.max_features == Some(0) {
            return Err(TransferError::Config(
                "max_features must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    position: usize,
    children_sse: f64,
}

/// A fitted (or unfitted) regression tree
#[derive(Debug, Clone)]
pub struct RegressionTree {
    params: TreeParams,
    nodes: Vec<Node>,
    n_features: usize,
    /// Unnormalised squared-error decrease per feature
    impurity_decrease: Array1<f64>,
}

impl RegressionTree {
    pub fn new(params: TreeParams) -> Self {
        RegressionTree {
            params,
            nodes: Vec::new(),
            n_features: 0,
            impurity_decrease: Array1::zeros(0),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn depth_from(nodes: &[Node], idx: usize) -> usize {
            match nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + depth_from(nodes, left).max(depth_from(nodes, right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_from(&self.nodes, 0)
        }
    }

    /// Fit on the rows listed in `indices` (repeats allowed)
    pub fn fit_indices(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Result<()> {
        check_training_data(x, y)?;
        self.params.validate()?;
        if indices.is_empty() {
            return Err(TransferError::EmptyData(
                "regression tree needs at least one sample".to_string(),
            ));
        }

        self.nodes.clear();
        self.n_features = x.ncols();
        self.impurity_decrease = Array1::zeros(x.ncols());

        let mut samples = indices.to_vec();
        self.grow(x, y, &mut samples, 0, rng);
        Ok(())
    }

    fn grow(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        samples: &mut [usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let n = samples.len();
        let sum: f64 = samples.iter().map(|&i| y[i]).sum();
        let sum_sq: f64 = samples.iter().map(|&i| y[i] * y[i]).sum();
        let mean = sum / n as f64;
        let node_sse = (sum_sq - sum * sum / n as f64).max(0.0);

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        let too_small = n < self.params.min_samples_split || n < 2 * self.params.min_samples_leaf;

        if depth_reached || too_small || node_sse <= 1e-12 {
            return self.push(Node::Leaf { value: mean });
        }

        let Some(best) = self.best_split(x, y, samples, node_sse, rng) else {
            return self.push(Node::Leaf { value: mean });
        };

        self.impurity_decrease[best.feature] += node_sse - best.children_sse;

        samples.sort_by(|&a, &b| x[[a, best.feature]].total_cmp(&x[[b, best.feature]]));
        let (left_samples, right_samples) = samples.split_at_mut(best.position);

        let idx = self.push(Node::Leaf { value: mean });
        let left = self.grow(x, y, left_samples, depth + 1, rng);
        let right = self.grow(x, y, right_samples, depth + 1, rng);
        self.nodes[idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn candidate_features(&self, rng: &mut StdRng) -> Vec<usize> {
        match self.params.max_features {
            Some(m) if m < self.n_features => {
                let mut features = rand::seq::index::sample(rng, self.n_features, m).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn best_split(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        samples: &[usize],
        node_sse: f64,
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf;
        let total_sum: f64 = samples.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = samples.iter().map(|&i| y[i] * y[i]).sum();

        let mut best: Option<BestSplit> = None;
        let mut order = samples.to_vec();

        for feature in self.candidate_features(rng) {
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 1..n {
                let prev = order[pos - 1];
                left_sum += y[prev];
                left_sq += y[prev] * y[prev];

                if pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let lo = x[[prev, feature]];
                let hi = x[[order[pos], feature]];
                if hi <= lo {
                    continue;
                }

                let left_n = pos as f64;
                let right_n = (n - pos) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let children_sse = (left_sq - left_sum * left_sum / left_n).max(0.0)
                    + (right_sq - right_sum * right_sum / right_n).max(0.0);

                if best.map_or(true, |b| children_sse < b.children_sse) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        position: pos,
                        children_sse,
                    });
                }
            }
        }

        best.filter(|b| b.children_sse < node_sse)
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Squared-error decrease credited to each feature, unnormalised
    pub fn impurity_decrease(&self) -> Option<&Array1<f64>> {
        self.is_fitted().then_some(&self.impurity_decrease)
    }

    /// Importances normalised to sum to one
    pub fn importances(&self) -> Option<Array1<f64>> {
        self.is_fitted()
            .then(|| normalize(self.impurity_decrease.clone()))
    }
}

impl RegressionTree {
    /// Fit on every row, seeding feature subsampling from `params.seed`
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        self.fit_indices(x, y, &indices, &mut rng)
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(TransferError::Model(
                "regression tree has not been fitted".to_string(),
            ));
        }
        check_columns(self.n_features, x)?;
        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }
}

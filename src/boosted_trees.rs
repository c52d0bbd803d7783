//! Gradient-boosted regression trees on squared error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf weights.
    pub l2: f64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.05,
            max_depth: 3,
            min_samples_leaf: 5,
            l2: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    /// Every split reads a feature below `width` and points forward to an
    /// existing node.
    pub fn accepts_width(&self, width: usize) -> bool {
        let len = self.nodes.len();
        len > 0
            && self.nodes.iter().enumerate().all(|(idx, node)| match node {
                TreeNode::Leaf { .. } => true,
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => *feature < width && (idx + 1..len).contains(left) && (idx + 1..len).contains(right),
            })
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl BoostedTrees {
    pub fn fit(x: &[&[f64]], y: &[f64], params: &BoostParams) -> Self {
        let n = y.len();
        let width = x.first().map(|row| row.len()).unwrap_or(0);
        let base_score = if n == 0 {
            0.0
        } else {
            y.iter().sum::<f64>() / n as f64
        };

        // Per-feature sample order, computed once and filtered per node.
        let orders: Vec<Vec<usize>> = (0..width)
            .map(|j| {
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| x[a][j].total_cmp(&x[b][j]).then(a.cmp(&b)));
                order
            })
            .collect();

        let mut pred = vec![base_score; n];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut residual = vec![0.0; n];
        let mut in_node = vec![false; n];

        for _ in 0..params.n_estimators {
            for i in 0..n {
                residual[i] = y[i] - pred[i];
            }
            let mut builder = TreeBuilder {
                x,
                residual: &residual,
                orders: &orders,
                in_node: &mut in_node,
                params,
                nodes: Vec::new(),
            };
            let members: Vec<usize> = (0..n).collect();
            builder.grow(&members, 0);
            let tree = RegressionTree {
                nodes: builder.nodes,
            };
            for i in 0..n {
                pred[i] += params.learning_rate * tree.predict(x[i]);
            }
            trees.push(tree);
        }

        Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
        }
    }

    pub fn accepts_width(&self, width: usize) -> bool {
        self.trees.iter().all(|tree| tree.accepts_width(width))
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let boost: f64 = self.trees.iter().map(|tree| tree.predict(x)).sum();
        self.base_score + self.learning_rate * boost
    }
}

struct TreeBuilder<'a> {
    x: &'a [&'a [f64]],
    residual: &'a [f64],
    orders: &'a [Vec<usize>],
    in_node: &'a mut [bool],
    params: &'a BoostParams,
    nodes: Vec<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, members: &[usize], depth: usize) -> usize {
        let idx = self.nodes.len();
        let sum: f64 = members.iter().map(|&i| self.residual[i]).sum();
        let leaf_value = sum / (members.len() as f64 + self.params.l2);
        self.nodes.push(TreeNode::Leaf { value: leaf_value });

        let min_leaf = self.params.min_samples_leaf.max(1);
        if depth >= self.params.max_depth || members.len() < 2 * min_leaf {
            return idx;
        }
        let Some(best) = self.best_split(members, sum, min_leaf) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = members
            .iter()
            .partition(|&&i| self.x[i][best.feature] <= best.threshold);
        let left = self.grow(&left_rows, depth + 1);
        let right = self.grow(&right_rows, depth + 1);
        self.nodes[idx] = TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&mut self, members: &[usize], total: f64, min_leaf: usize) -> Option<BestSplit> {
        let n = members.len();
        let lambda = self.params.l2;
        let parent_score = total * total / (n as f64 + lambda);
        for &i in members {
            self.in_node[i] = true;
        }

        let mut best: Option<BestSplit> = None;
        for (feature, order) in self.orders.iter().enumerate() {
            let sorted: Vec<usize> = order.iter().copied().filter(|&i| self.in_node[i]).collect();
            let mut left_sum = 0.0;
            for pos in 0..n - 1 {
                let i = sorted[pos];
                left_sum += self.residual[i];
                let left_n = pos + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let here = self.x[i][feature];
                let next = self.x[sorted[pos + 1]][feature];
                if here == next {
                    continue;
                }
                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / (left_n as f64 + lambda)
                    + right_sum * right_sum / (right_n as f64 + lambda)
                    - parent_score;
                if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        for &i in members {
            self.in_node[i] = false;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_a_step_function() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = rows.iter().map(|r| if r[0] < 20.0 { 1.0 } else { 5.0 }).collect();
        let x: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();

        let model = BoostedTrees::fit(&x, &y, &BoostParams::default());
        assert!((model.predict(&[5.0, 0.0]) - 1.0).abs() < 0.2);
        assert!((model.predict(&[30.0, 1.0]) - 5.0).abs() < 0.2);
    }

    #[test]
    fn respects_max_depth() {
        let rows: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let x: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let params = BoostParams {
            n_estimators: 5,
            max_depth: 2,
            min_samples_leaf: 1,
            ..BoostParams::default()
        };
        let model = BoostedTrees::fit(&x, &y, &params);
        assert!(model.trees.iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn constant_target_predicts_the_constant() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y = vec![0.7; 20];
        let x: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let model = BoostedTrees::fit(&x, &y, &BoostParams::default());
        assert!((model.predict(&[3.0]) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn fitting_is_deterministic() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![(i * 13 % 7) as f64, i as f64]).collect();
        let y: Vec<f64> = rows.iter().map(|r| r[0] * 0.5 + r[1] * 0.1).collect();
        let x: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let a = BoostedTrees::fit(&x, &y, &BoostParams::default());
        let b = BoostedTrees::fit(&x, &y, &BoostParams::default());
        assert_eq!(a, b);
    }

    #[test]
    fn fitted_trees_only_read_known_features() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![(i % 5) as f64, i as f64]).collect();
        let y: Vec<f64> = rows.iter().map(|r| r[1] * 0.2).collect();
        let x: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let model = BoostedTrees::fit(&x, &y, &BoostParams::default());
        assert!(model.accepts_width(2));
        assert!(!model.accepts_width(1));
    }

    #[test]
    fn malformed_tree_is_refused() {
        let backwards = RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 1,
                },
                TreeNode::Leaf { value: 1.0 },
            ],
        };
        assert!(!backwards.accepts_width(3));
        assert!(!RegressionTree { nodes: Vec::new() }.accepts_width(3));
    }
}

//! Standard scaler and random forest evaluated natively from a fitted artifact

use serde::{Deserialize, Serialize};

/// Per-feature standardization fitted on the training split: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Number of features the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Check dimensions and that every scale is a usable divisor
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.mean.len() != n_features || self.scale.len() != n_features {
            return Err(format!(
                "scaler has {} means and {} scales, expected {}",
                self.mean.len(),
                self.scale.len(),
                n_features
            ));
        }
        if let Some(i) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(format!("scaler mean for feature {i} is not finite"));
        }
        if let Some(i) = self
            .scale
            .iter()
            .position(|s| !s.is_finite() || *s == 0.0)
        {
            return Err(format!("scaler scale for feature {i} is zero or not finite"));
        }
        Ok(())
    }

    /// Standardize one row
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect()
    }
}

/// Node of a fitted decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    /// Go to `left` when `x[feature] <= threshold`, else to `right`.
    ///
    /// The feature is rounded to `f32` before comparing, matching how the
    /// training library evaluates its thresholds.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class probabilities `[P(decline), P(accept)]` at this leaf
    Leaf { probabilities: [f64; 2] },
}

/// Binary decision tree stored as a flat node list rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Check node references.
    ///
    /// Children must point forward in the node list, which rules out cycles
    /// and keeps traversal bounded by the node count.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {idx} splits on feature {feature}, only {n_features} features"
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx} has a non-finite threshold"));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx} has invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { probabilities } => {
                    if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
                        return Err(format!("leaf {idx} has invalid probabilities"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Class probabilities for a standardized row
    pub fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // Fitted trees compare single-precision features
                    idx = if f64::from(row[*feature] as f32) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                TreeNode::Leaf { probabilities } => return *probabilities,
            }
        }
    }
}

/// Bagged ensemble of decision trees; the prediction is the mean of tree probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    /// Mean class probabilities across trees
    pub fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        let mut sum = [0.0, 0.0];
        for tree in &self.trees {
            let p = tree.predict_proba(row);
            sum[0] += p[0];
            sum[1] += p[1];
        }
        let n = self.trees.len() as f64;
        [sum[0] / n, sum[1] / n]
    }

    /// Label 1 only when accept is strictly more probable; ties go to class 0
    pub fn predict(&self, row: &[f64]) -> i64 {
        let [decline, accept] = self.predict_proba(row);
        if accept > decline {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, low: [f64; 2], high: [f64; 2]) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { probabilities: low },
                TreeNode::Leaf { probabilities: high },
            ],
        }
    }

    #[test]
    fn test_scaler_transform() {
        let scaler = StandardScaler {
            mean: vec![10.0, 0.0],
            scale: vec![2.0, 0.5],
        };
        assert_eq!(scaler.transform(&[14.0, 1.0]), vec![2.0, 2.0]);
    }

    #[test]
    fn test_scaler_rejects_zero_scale() {
        let scaler = StandardScaler {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 0.0],
        };
        assert!(scaler.validate(2).is_err());
        assert!(scaler.validate(3).is_err());
    }

    #[test]
    fn test_tree_threshold_goes_left_inclusive() {
        let tree = stump(0, 1.0, [1.0, 0.0], [0.0, 1.0]);
        assert_eq!(tree.predict_proba(&[1.0]), [1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[1.0001]), [0.0, 1.0]);
    }

    #[test]
    fn test_tree_compares_in_single_precision() {
        let tree = stump(0, 0.5 + 1e-9, [1.0, 0.0], [0.0, 1.0]);
        // Above the threshold in f64, equal to 0.5 once rounded to f32
        assert_eq!(tree.predict_proba(&[0.5 + 2e-9]), [1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[0.5 + 1e-6]), [0.0, 1.0]);
    }

    #[test]
    fn test_tree_validation() {
        assert!(stump(0, 1.0, [1.0, 0.0], [0.0, 1.0]).validate(1).is_ok());
        assert!(stump(3, 1.0, [1.0, 0.0], [0.0, 1.0]).validate(2).is_err());

        let cyclic = DecisionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(cyclic.validate(1).is_err());
        assert!(DecisionTree { nodes: vec![] }.validate(1).is_err());
    }

    #[test]
    fn test_forest_averages_trees() {
        let forest = RandomForest {
            trees: vec![
                stump(0, 0.0, [0.9, 0.1], [0.2, 0.8]),
                stump(1, 0.0, [0.7, 0.3], [0.4, 0.6]),
            ],
        };

        let p = forest.predict_proba(&[1.0, -1.0]);
        assert!((p[0] - 0.45).abs() < 1e-12);
        assert!((p[1] - 0.55).abs() < 1e-12);
        assert_eq!(forest.predict(&[1.0, -1.0]), 1);
        assert_eq!(forest.predict(&[-1.0, -1.0]), 0);
    }

    #[test]
    fn test_forest_tie_is_decline() {
        let forest = RandomForest {
            trees: vec![DecisionTree {
                nodes: vec![TreeNode::Leaf {
                    probabilities: [0.5, 0.5],
                }],
            }],
        };
        assert_eq!(forest.predict(&[0.0]), 0);
    }

    #[test]
    fn test_node_serialization_format() {
        let json = r#"{"type":"split","feature":1,"threshold":4.6,"left":1,"right":2}"#;
        let node: TreeNode = serde_json::from_str(json).unwrap();
        assert_eq!(
            node,
            TreeNode::Split {
                feature: 1,
                threshold: 4.6,
                left: 1,
                right: 2
            }
        );
    }
}

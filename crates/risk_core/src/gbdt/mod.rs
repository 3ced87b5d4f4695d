//! Gradient Boosted Decision Tree ensembles
//!
//! Float-valued tree ensembles of the kind produced by XGBoost-style binary
//! classifiers, with the training cover kept on each node so exact
//! per-feature attributions can be computed later.
//!
//! # Model Format
//!
//! Artifacts are JSON (or the bincode encoding of the same structure):
//!
//! ```json
//! {
//!   "version": 1,
//!   "feature_names": ["LIMIT_BAL", "AGE"],
//!   "objective": "binary:logistic",
//!   "base_margin": -1.2,
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"id":0,"left":1,"right":2,"feature_idx":0,"threshold":80000.0,"leaf":null,"cover":1000.0},
//!         {"id":1,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":0.15,"cover":300.0},
//!         {"id":2,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":-0.35,"cover":700.0}
//!       ],
//!       "weight": 1.0
//!     }
//!   ]
//! }
//! ```
//!
//! # Usage
//!
//! ```rust
//! use credit_risk_core::gbdt::{Ensemble, Node, Objective, Tree};
//!
//! let tree = Tree::new(
//!     vec![
//!         Node::internal(0, 0, 80_000.0, 1, 2, 1000.0),
//!         Node::leaf(1, 0.15, 300.0),
//!         Node::leaf(2, -0.35, 700.0),
//!     ],
//!     1.0,
//! );
//! let model = Ensemble::new(vec!["LIMIT_BAL".into()], Objective::BinaryLogistic, -1.2, vec![tree]);
//!
//! let p = model.predict(&[200_000.0]);
//! assert!(p > 0.0 && p < 1.0);
//! ```

pub mod model;
pub mod tree;

pub use model::{sigmoid, Ensemble, ModelError, Objective, MODEL_VERSION};
pub use tree::{Node, Tree};

//! K-means clusterer
//!
//! Lloyd iterations from a seeded initialization. The only randomness is the
//! choice of initial centroids, drawn from the stage's forked RNG context, so
//! the same seed and data always give the same clusters. The assignment step
//! runs on the context's worker pool.

use super::{features, FitEnv};
use crate::dataframe::{Dataframe, Value};
use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How initial centroids are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Initialization {
    /// `k` distinct records chosen uniformly at random
    #[default]
    Forgy,
    /// One random record, then repeatedly the record farthest from all chosen
    FurthestFirst,
}

/// K-means parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KMeansParams {
    /// Number of clusters
    pub k: usize,
    /// Upper bound on Lloyd iterations
    pub max_iterations: usize,
    /// Initialization strategy
    pub initialization: Initialization,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            k: 2,
            max_iterations: 200,
            initialization: Initialization::default(),
        }
    }
}

impl KMeansParams {
    /// Set number of clusters
    #[must_use]
    pub const fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set iteration bound
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set initialization strategy
    #[must_use]
    pub const fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }
}

/// Learned cluster centroids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansState {
    columns: Vec<String>,
    centroids: Vec<Vec<f64>>,
    iterations: usize,
}

impl KMeansState {
    /// Centroids, indexed by cluster id.
    #[must_use]
    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    /// Lloyd iterations run before convergence (or the bound).
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    pub(super) fn predict(&self, df: &mut Dataframe) -> Result<()> {
        for record in df.records_mut() {
            let x = features::vector(record, &self.columns);
            let distances: Vec<f64> = self
                .centroids
                .iter()
                .map(|c| features::squared_euclidean(&x, c))
                .collect();
            let cluster = features::argmin(&distances);
            record.set_y_predicted(Some(cluster_label(cluster)));
            record.set_probabilities(Some(features::distance_probabilities(
                (0..self.centroids.len()).map(cluster_label),
                &distances,
            )));
        }
        Ok(())
    }
}

#[allow(clippy::cast_precision_loss)]
fn cluster_label(cluster: usize) -> Value {
    Value::Number(cluster as f64)
}

fn initial_centroids(params: &KMeansParams, rows: &[Vec<f64>], env: &FitEnv<'_>) -> Vec<Vec<f64>> {
    let mut rng = env.rng.generator();
    match params.initialization {
        Initialization::Forgy => rand::seq::index::sample(&mut rng, rows.len(), params.k)
            .into_iter()
            .map(|i| rows[i].clone())
            .collect(),
        Initialization::FurthestFirst => {
            let mut chosen = vec![rows[rng.gen_range(0..rows.len())].clone()];
            while chosen.len() < params.k {
                let farthest: Vec<f64> = rows
                    .iter()
                    .map(|r| {
                        chosen
                            .iter()
                            .map(|c| features::squared_euclidean(r, c))
                            .fold(f64::INFINITY, f64::min)
                    })
                    .map(|d| -d)
                    .collect();
                chosen.push(rows[features::argmin(&farthest)].clone());
            }
            chosen
        }
    }
}

pub(super) fn fit(params: &KMeansParams, df: &Dataframe, env: &FitEnv<'_>) -> Result<KMeansState> {
    if params.k == 0 {
        return Err(Error::InvalidInput("k-means needs k >= 1".to_string()));
    }
    let columns = features::model_columns(df.schema());
    features::require_columns(&columns, "k-means")?;
    let rows: Vec<Vec<f64>> = df
        .records()
        .map(|r| features::vector(r, &columns))
        .collect();
    if rows.len() < params.k {
        return Err(Error::InvalidInput(format!(
            "k-means with k={} needs at least {} records, got {}",
            params.k,
            params.k,
            rows.len()
        )));
    }

    let mut centroids = initial_centroids(params, &rows, env);
    let mut assignment: Vec<usize> = Vec::new();
    let mut iterations = 0;
    while iterations < params.max_iterations {
        iterations += 1;
        let next = env.executor.map((0..rows.len()).collect(), |i| {
            let distances: Vec<f64> = centroids
                .iter()
                .map(|c| features::squared_euclidean(&rows[i], c))
                .collect();
            features::argmin(&distances)
        });
        if next == assignment {
            break;
        }
        assignment = next;

        let dims = columns.len();
        let mut sums = vec![vec![0.0; dims]; params.k];
        let mut counts = vec![0_usize; params.k];
        for (row, &cluster) in rows.iter().zip(&assignment) {
            counts[cluster] += 1;
            for (s, x) in sums[cluster].iter_mut().zip(row) {
                *s += x;
            }
        }
        for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
            // empty clusters keep their previous centroid
            if count > 0 {
                #[allow(clippy::cast_precision_loss)]
                let n = count as f64;
                *centroid = sum.into_iter().map(|s| s / n).collect();
            }
        }
    }
    debug!(k = params.k, iterations, "k-means converged");

    Ok(KMeansState {
        columns,
        centroids,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Executor, RngContext};
    use crate::dataframe::{DataType, Record, Schema};

    fn blobs() -> Dataframe {
        let schema = Schema::new([("x", DataType::Numerical), ("y", DataType::Numerical)]).unwrap();
        let mut df = Dataframe::new(schema);
        for i in 0..20 {
            let jitter = f64::from(i % 4) * 0.1;
            let (cx, cy) = if i % 2 == 0 { (0.0, 0.0) } else { (10.0, 10.0) };
            df.add(
                Record::default()
                    .with_feature("x", cx + jitter)
                    .with_feature("y", cy - jitter),
            )
            .unwrap();
        }
        df
    }

    fn fit_with(params: &KMeansParams, data: &Dataframe, executor: &Executor, seed: u64) -> KMeansState {
        fit(
            params,
            data,
            &FitEnv {
                executor,
                rng: RngContext::new(seed),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_separates_two_blobs() {
        let mut data = blobs();
        let params = KMeansParams::default().with_initialization(Initialization::FurthestFirst);
        let state = fit_with(&params, &data, &Executor::serial(), 3);
        state.predict(&mut data).unwrap();

        let even = data.get(0).unwrap().y_predicted().cloned();
        let odd = data.get(1).unwrap().y_predicted().cloned();
        assert_ne!(even, odd);
        for (id, record) in data.iter() {
            let expected = if id % 2 == 0 { &even } else { &odd };
            assert_eq!(record.y_predicted(), expected.as_ref());
        }
    }

    #[test]
    fn test_same_seed_same_centroids() {
        let data = blobs();
        let params = KMeansParams::default().with_k(3);
        let a = fit_with(&params, &data, &Executor::serial(), 11);
        let b = fit_with(&params, &data, &Executor::with_threads(4).unwrap(), 11);
        assert_eq!(a, b);
    }

    #[test]
    fn test_iteration_bound() {
        let data = blobs();
        let params = KMeansParams::default().with_max_iterations(1);
        let state = fit_with(&params, &data, &Executor::serial(), 0);
        assert_eq!(state.iterations(), 1);
        assert_eq!(state.centroids().len(), 2);
    }

    #[test]
    fn test_rejects_bad_k() {
        let data = blobs();
        let executor = Executor::serial();
        let env = FitEnv {
            executor: &executor,
            rng: RngContext::new(0),
        };
        assert!(fit(&KMeansParams::default().with_k(0), &data, &env).is_err());
        assert!(fit(&KMeansParams::default().with_k(21), &data, &env).is_err());
    }

    #[test]
    fn test_probabilities_keyed_by_cluster() {
        let mut data = blobs();
        let state = fit_with(&KMeansParams::default(), &data, &Executor::serial(), 5);
        state.predict(&mut data).unwrap();
        let probs = data.get(0).unwrap().probabilities().unwrap();
        assert_eq!(
            probs.keys().cloned().collect::<Vec<_>>(),
            vec![Value::Number(0.0), Value::Number(1.0)]
        );
    }
}

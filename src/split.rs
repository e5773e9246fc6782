//! Random train/test splitting
//!
//! Record ids are taken in ascending order, shuffled with a generator seeded
//! from the caller's seed, and the first `floor(n * fraction)` become the
//! training set. The same `(dataframe, fraction, seed)` always yields the same
//! partition, and the input dataframe is never modified.

use crate::context::Context;
use crate::dataframe::Dataframe;
use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/// Disjoint train/test partition of a dataframe
#[derive(Debug)]
pub struct Split {
    /// Training records
    pub train: Dataframe,
    /// Held-out records
    pub test: Dataframe,
}

/// Split `df` into train/test sets with `train_fraction` of the records in train.
///
/// Both parts keep the source schema and label column and hold independent
/// copies of the records (ids are preserved).
///
/// # Errors
/// Returns `InvalidFraction` unless `0 < train_fraction < 1`
pub fn split(df: &Dataframe, train_fraction: f64, seed: u64) -> Result<Split> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(Error::InvalidFraction(train_fraction));
    }

    let mut ids = df.ids();
    ids.shuffle(&mut StdRng::seed_from_u64(seed));

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let train_size = (ids.len() as f64 * train_fraction).floor() as usize;
    let (train, test) = ids.split_at(train_size);
    debug!(
        records = df.len(),
        train = train.len(),
        test = test.len(),
        seed,
        "split dataframe"
    );

    Ok(Split {
        train: df.subset(train),
        test: df.subset(test),
    })
}

/// Splitter drawing its seed from a context's RNG.
///
/// Successive calls on one splitter use one forked stream each, so a
/// sequence of splits is reproducible from the context seed alone.
#[derive(Debug, Clone)]
pub struct Splitter {
    ctx: Context,
    calls: u64,
}

impl Splitter {
    /// Splitter bound to `ctx`.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            calls: 0,
        }
    }

    /// Split with the next seed of this splitter's sequence.
    ///
    /// # Errors
    /// Returns `InvalidFraction` unless `0 < train_fraction < 1`
    pub fn split(&mut self, df: &Dataframe, train_fraction: f64) -> Result<Split> {
        let seed = self
            .ctx
            .rng()
            .fork(&format!("splitter.{}", self.calls))
            .seed();
        let parts = split(df, train_fraction, seed)?;
        self.calls += 1;
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dataframe::{DataType, Record, Schema};
    use std::collections::BTreeSet;

    fn df(n: u32) -> Dataframe {
        let mut df = Dataframe::new(Schema::new([("x", DataType::Numerical)]).unwrap())
            .with_label("t", DataType::Boolean);
        for i in 0..n {
            df.add(Record::default().with_feature("x", f64::from(i)).with_label(i % 2 == 0))
                .unwrap();
        }
        df
    }

    #[test]
    fn test_split_sizes_use_floor() {
        let parts = split(&df(100), 0.8, 1).unwrap();
        assert_eq!((parts.train.len(), parts.test.len()), (80, 20));

        let parts = split(&df(10), 0.55, 1).unwrap();
        assert_eq!((parts.train.len(), parts.test.len()), (5, 5));

        let parts = split(&df(3), 0.2, 1).unwrap();
        assert_eq!((parts.train.len(), parts.test.len()), (0, 3));
    }

    #[test]
    fn test_split_is_a_partition() {
        let source = df(50);
        let parts = split(&source, 0.7, 9).unwrap();
        let train: BTreeSet<u64> = parts.train.ids().into_iter().collect();
        let test: BTreeSet<u64> = parts.test.ids().into_iter().collect();

        assert!(train.is_disjoint(&test));
        let all: BTreeSet<u64> = train.union(&test).copied().collect();
        assert_eq!(all, source.ids().into_iter().collect());
        for id in &train {
            assert_eq!(parts.train.get(*id), source.get(*id));
        }
        assert_eq!(parts.train.label(), source.label());
    }

    #[test]
    fn test_split_is_deterministic() {
        let source = df(40);
        let a = split(&source, 0.5, 3).unwrap();
        let b = split(&source, 0.5, 3).unwrap();
        let c = split(&source, 0.5, 4).unwrap();
        assert_eq!(a.train.ids(), b.train.ids());
        assert_ne!(a.train.ids(), c.train.ids());
    }

    #[test]
    fn test_invalid_fractions() {
        for fraction in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                split(&df(10), fraction, 1),
                Err(Error::InvalidFraction(_))
            ));
        }
    }

    #[test]
    fn test_splitter_sequence_is_reproducible() {
        let source = df(30);
        let ctx = Context::new(Config::builder().random_seed(5).build().unwrap()).unwrap();
        let mut first = Splitter::new(&ctx);
        let mut second = Splitter::new(&ctx);

        let a1 = first.split(&source, 0.5).unwrap();
        let a2 = first.split(&source, 0.5).unwrap();
        let b1 = second.split(&source, 0.5).unwrap();
        assert_eq!(a1.train.ids(), b1.train.ids());
        assert_ne!(a1.train.ids(), a2.train.ids());
    }
}

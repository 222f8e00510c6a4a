//! Block producers and capacity distributions

use serde::{Deserialize, Serialize};

/// Numeric type of each producer's unique identifier.
pub type ProducerId = usize;

/// A block producer: a PoW miner, PoS validator, or PoSpace farmer,
/// depending on the configured consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub id: ProducerId,
    /// Hashrate, stake, or allocated space. Always positive.
    pub capacity: f64,
    /// Whether this producer follows an attack strategy.
    pub adversary: bool,
}

/// Determines how total capacity is split between producers.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub enum CapacityProfile {
    /// Weight each producer equally.
    #[default]
    Equal,
    /// Give producer 0 (the adversary) the specified fraction of total
    /// capacity, splitting the remainder equally between the others.
    Adversary(f64),
    /// Explicit per-producer shares. Must sum to 1.0.
    Explicit(Vec<f64>),
}

#[derive(Debug, thiserror::Error)]
pub enum CapacityProfileError {
    #[error("capacity shares sum to {0}, not 1.0")]
    BadShareSum(f64),
    #[error("capacity share {0} is not in the range 0.0..=1.0")]
    BadShare(f64),
    #[error("explicit share count {0} does not match producer count {1}")]
    WrongProducerCount(usize, usize),
    #[error("cannot distribute capacity over zero producers")]
    ZeroProducers,
    #[error("adversary profile needs at least one honest producer")]
    NoHonestProducers,
}

impl CapacityProfile {
    /// Allowable difference between a share sum and 1.0.
    const EPSILON_SHARE: f64 = 1e-6;

    /// Checks that this profile is a valid discrete distribution over
    /// `count` producers.
    pub fn validate(&self, count: usize) -> Result<(), CapacityProfileError> {
        use CapacityProfileError::*;

        if count == 0 {
            return Err(ZeroProducers);
        }

        match self {
            Self::Equal => Ok(()),
            Self::Adversary(fraction) => {
                if count == 1 {
                    return Err(NoHonestProducers);
                }
                if fraction.is_nan() || !(0.0..=1.0).contains(fraction) {
                    return Err(BadShare(*fraction));
                }

                Ok(())
            }
            Self::Explicit(shares) => {
                if shares.len() != count {
                    return Err(WrongProducerCount(shares.len(), count));
                }

                if let Some(&bad) = shares
                    .iter()
                    .find(|&s| s.is_nan() || !(0.0..=1.0).contains(s))
                {
                    return Err(BadShare(bad));
                }

                let sum: f64 = shares.iter().sum();
                if f64::abs(sum - 1.0) > Self::EPSILON_SHARE {
                    return Err(BadShareSum(sum));
                }

                Ok(())
            }
        }
    }

    /// Returns the per-producer shares described by this profile.
    pub fn shares(
        &self,
        count: usize,
    ) -> Result<Vec<f64>, CapacityProfileError> {
        self.validate(count)?;

        Ok(match self {
            Self::Equal => vec![1.0 / count as f64; count],
            Self::Adversary(fraction) => {
                let other = (1.0 - fraction) / (count - 1) as f64;

                let mut shares = vec![other; count];
                shares[0] = *fraction;
                shares
            }
            Self::Explicit(shares) => shares.clone(),
        })
    }

    /// Builds the producer set for a network with `total_capacity` units
    /// split according to this profile. With an [`Adversary`] profile,
    /// producer 0 is flagged as the adversary.
    ///
    /// [`Adversary`]: CapacityProfile::Adversary
    pub fn build_producers(
        &self,
        count: usize,
        total_capacity: f64,
    ) -> Result<Vec<Producer>, CapacityProfileError> {
        let shares = self.shares(count)?;
        let adversarial = matches!(self, Self::Adversary(_));

        Ok(shares
            .into_iter()
            .enumerate()
            .map(|(id, share)| Producer {
                id,
                capacity: share * total_capacity,
                adversary: adversarial && id == 0,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::CapacityProfile;

    #[test]
    fn equal_shares() {
        assert_eq!(
            CapacityProfile::Equal.shares(4).unwrap(),
            vec![0.25, 0.25, 0.25, 0.25]
        );
    }

    #[test]
    fn adversary_takes_its_fraction() {
        let producers = CapacityProfile::Adversary(0.4)
            .build_producers(4, 100.0)
            .unwrap();

        assert!(producers[0].adversary);
        assert!((producers[0].capacity - 40.0).abs() < 1e-9);
        assert!((producers[1].capacity - 20.0).abs() < 1e-9);
        assert!(!producers[1].adversary);
    }

    #[test]
    fn explicit_shares_must_sum_to_one() {
        let profile = CapacityProfile::Explicit(vec![0.5, 0.4]);
        assert!(profile.validate(2).is_err());
    }

    #[test]
    fn zero_producers_rejected() {
        assert!(CapacityProfile::Equal.validate(0).is_err());
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("weight for {factor} must be non-negative, got {value}")]
    Negative { factor: &'static str, value: f64 },
    #[error("weights must not all be zero")]
    AllZero,
}

/// Relative importance of each scoring factor. Weights are not required to
/// sum to 1.0 and are applied as-is, with no normalization; callers that
/// want a 0..1 overall score keep the sum at 1.0 themselves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Weights {
    pub skills: f64,
    pub experience: f64,
    pub location: f64,
    pub salary: f64,
    pub company: f64,
}

pub const DEFAULT_WEIGHTS: Weights = Weights {
    skills: 0.35,
    experience: 0.25,
    location: 0.20,
    salary: 0.10,
    company: 0.10,
};

impl Default for Weights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.skills + self.experience + self.location + self.salary + self.company
    }

    pub fn validate(&self) -> Result<(), WeightsError> {
        let factors = [
            ("skills", self.skills),
            ("experience", self.experience),
            ("location", self.location),
            ("salary", self.salary),
            ("company", self.company),
        ];
        for (factor, value) in factors {
            if value < 0.0 || !value.is_finite() {
                return Err(WeightsError::Negative { factor, value });
            }
        }
        if self.sum() == 0.0 {
            return Err(WeightsError::AllZero);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!((DEFAULT_WEIGHTS.sum() - 1.0).abs() < 1e-12);
        assert!(DEFAULT_WEIGHTS.validate().is_ok());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let weights = Weights {
            skills: -0.1,
            ..DEFAULT_WEIGHTS
        };
        assert_eq!(
            weights.validate(),
            Err(WeightsError::Negative {
                factor: "skills",
                value: -0.1
            })
        );
    }

    #[test]
    fn all_zero_weights_are_rejected() {
        let weights = Weights {
            skills: 0.0,
            experience: 0.0,
            location: 0.0,
            salary: 0.0,
            company: 0.0,
        };
        assert_eq!(weights.validate(), Err(WeightsError::AllZero));
    }

    #[test]
    fn non_normalized_weights_are_accepted() {
        let weights = Weights {
            skills: 2.0,
            experience: 1.0,
            location: 1.0,
            salary: 0.0,
            company: 0.0,
        };
        assert!(weights.validate().is_ok());
        assert!((weights.sum() - 4.0).abs() < 1e-12);
    }
}

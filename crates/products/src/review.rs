use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, Entity, UserId, ValueObject};

/// A star rating in `0.0..=5.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rating(f64);

impl Rating {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 5.0;

    pub fn new(value: f64) -> Result<Self, DomainError> {
        if !value.is_finite() || !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(DomainError::validation("Rating must be between 0 and 5"));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl ValueObject for Rating {}

/// A customer review. One per (product, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub user: UserId,
    pub comment: String,
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
}

impl Entity for Review {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.user
    }
}

/// Running aggregate of review ratings.
///
/// Keeps the unrounded total so the exposed average is always
/// `round1(total / count)`, never a rounding of a previous rounding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    total: f64,
    count: u64,
}

impl RatingSummary {
    pub fn record(&mut self, rating: Rating) {
        self.total += rating.value();
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean rating rounded to one decimal place; `0.0` with no reviews.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        round1(self.total / self.count as f64)
    }
}

/// Round half away from zero to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(Rating::new(0.0).is_ok());
        assert!(Rating::new(5.0).is_ok());
        assert!(Rating::new(-1.0).is_err());
        assert!(Rating::new(5.1).is_err());
        assert!(Rating::new(f64::NAN).is_err());
    }

    #[test]
    fn empty_summary_averages_to_zero() {
        assert_eq!(RatingSummary::default().average(), 0.0);
    }

    #[test]
    fn average_is_rounded_to_one_decimal() {
        let mut summary = RatingSummary::default();
        for r in [4.0, 4.0, 5.0] {
            summary.record(Rating::new(r).unwrap());
        }
        // 13 / 3 = 4.333..
        assert_eq!(summary.average(), 4.3);
        assert_eq!(summary.count(), 3);
    }
}

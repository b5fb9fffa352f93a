//! Parameter bounds implementation
//!
//! Bounds serve two purposes in this crate: a clamp applied to the proposed
//! coefficients during local refinement, and the search box of the global
//! optimizer. The global optimizer never rejects a malformed box; it asks
//! [`Bounds::repaired`] for a usable one instead.

use serde::{Deserialize, Serialize};
use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must be less than or equal to max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Bounds must not be NaN")]
    NanBound,
}

/// How a malformed search interval was repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsRepair {
    /// The lower and upper values were given in reverse order.
    Swapped,

    /// Both values were equal and the upper one was pushed up.
    Widened,

    /// The width overflowed and the interval was shrunk around its midpoint.
    Narrowed,
}

/// Represents the bounds constraints on a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Bounds", 2)?;

        // JSON has no infinities, an open side is written as null
        if self.min.is_infinite() && self.min.is_sign_negative() {
            state.serialize_field("min", &Option::<f64>::None)?;
        } else {
            state.serialize_field("min", &self.min)?;
        }

        if self.max.is_infinite() && self.max.is_sign_positive() {
            state.serialize_field("max", &Option::<f64>::None)?;
        } else {
            state.serialize_field("max", &self.max)?;
        }

        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,

            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;

        let min = helper.min.unwrap_or(NEG_INFINITY);
        let max = helper.max.unwrap_or(INFINITY);

        Bounds::new(min, max).map_err(serde::de::Error::custom)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create a new bounds constraint with min and max values
    ///
    /// # Arguments
    ///
    /// * `min` - Minimum allowed value for the parameter
    /// * `max` - Maximum allowed value for the parameter
    ///
    /// # Returns
    ///
    /// A new `Bounds` object if min <= max, or an error otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// use lmbopt_rs::parameters::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert_eq!(bounds.max, 10.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() {
            return Err(BoundsError::NanBound);
        }
        if min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Create an unbounded constraint (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create a bounds constraint with only a minimum value
    pub fn min_only(min: f64) -> Self {
        Self {
            min,
            max: INFINITY,
        }
    }

    /// Create a bounds constraint with only a maximum value
    pub fn max_only(max: f64) -> Self {
        Self {
            min: NEG_INFINITY,
            max,
        }
    }

    /// Build a usable search interval out of two arbitrary values.
    ///
    /// Reversed values are swapped. Equal values get their upper side pushed
    /// up: to 7 when both are zero, otherwise by its own magnitude. The result
    /// always satisfies `min < max` for finite input.
    ///
    /// # Examples
    ///
    /// ```
    /// use lmbopt_rs::parameters::bounds::{Bounds, BoundsRepair};
    ///
    /// let (bounds, repair) = Bounds::repaired(3.0, 1.0);
    /// assert_eq!((bounds.min, bounds.max), (1.0, 3.0));
    /// assert_eq!(repair, Some(BoundsRepair::Swapped));
    ///
    /// let (bounds, repair) = Bounds::repaired(-2.0, -2.0);
    /// assert_eq!((bounds.min, bounds.max), (-2.0, 0.0));
    /// assert_eq!(repair, Some(BoundsRepair::Widened));
    /// ```
    pub fn repaired(low: f64, high: f64) -> (Self, Option<BoundsRepair>) {
        if low > high {
            (Self { min: high, max: low }, Some(BoundsRepair::Swapped))
        } else if low == high {
            let max = if high == 0.0 { 7.0 } else { high + high.abs() };
            (Self { min: low, max }, Some(BoundsRepair::Widened))
        } else {
            (Self { min: low, max: high }, None)
        }
    }

    /// Bring an interval whose width is not a finite number into sampling range.
    ///
    /// Infinite ends are first pulled to the largest finite `f64`; if the
    /// width still overflows, the interval is cut to a window half as wide as
    /// `f64::MAX` around its midpoint. Returns `None` when the width is
    /// already finite.
    ///
    /// ```
    /// use lmbopt_rs::parameters::Bounds;
    ///
    /// let bounds = Bounds { min: -1e308, max: 1e308 }.narrowed().unwrap();
    /// assert!(bounds.width().is_finite());
    /// assert_eq!(bounds.min, -bounds.max);
    /// assert!(Bounds { min: 0.0, max: 1.0 }.narrowed().is_none());
    /// ```
    pub fn narrowed(&self) -> Option<Self> {
        if self.width().is_finite() {
            return None;
        }
        let lo = if self.min.is_nan() { -f64::MAX } else { self.min.max(-f64::MAX) };
        let hi = if self.max.is_nan() { f64::MAX } else { self.max.min(f64::MAX) };

        // Both ends saturated on the same side
        if lo >= hi {
            return Some(if lo > 0.0 {
                Self { min: f64::MAX / 2.0, max: f64::MAX }
            } else {
                Self { min: -f64::MAX, max: -f64::MAX / 2.0 }
            });
        }
        if (hi - lo).is_finite() {
            return Some(Self { min: lo, max: hi });
        }

        let half = f64::MAX / 4.0;
        let mid = lo / 2.0 + hi / 2.0;
        Some(Self {
            min: lo.max(mid - half),
            max: hi.min(mid + half),
        })
    }

    /// Check if a value is within the bounds
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check if the bounds are finite (both min and max are finite)
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Width of the interval.
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

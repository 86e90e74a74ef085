//! Distance-decay kernels for geographically weighted models
//!
//! Maps a distance `d` and bandwidth `h` to a weight in [0, 1]:
//!
//! | Kernel      | Weight                        |
//! |-------------|-------------------------------|
//! | Gaussian    | exp(-0.5 (d/h)²)              |
//! | Exponential | exp(-d/h)                     |
//! | Bisquare    | (1 - (d/h)²)²  for d < h, else 0 |
//! | Tricube     | (1 - (d/h)³)³  for d < h, else 0 |
//! | Boxcar      | 1 for d < h, else 0           |
//!
//! Every kernel is 1 at d = 0 and non-increasing in d. With h = +∞ every
//! weight is 1, which turns a local fit into the global one.

use std::fmt;
use std::str::FromStr;

use geolocus_core::{Error, Result};

/// Kernel function family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kernel {
    #[default]
    Gaussian,
    Exponential,
    Bisquare,
    Tricube,
    Boxcar,
}

impl Kernel {
    pub const ALL: [Kernel; 5] = [
        Kernel::Gaussian,
        Kernel::Exponential,
        Kernel::Bisquare,
        Kernel::Tricube,
        Kernel::Boxcar,
    ];

    /// Weight for distance `d` under bandwidth `h`.
    ///
    /// A zero bandwidth keeps only the location itself (weight 1 at d = 0).
    #[inline]
    pub fn weight(self, d: f64, h: f64) -> f64 {
        if d <= 0.0 {
            return 1.0;
        }
        if h <= 0.0 {
            return 0.0;
        }
        let u = d / h;
        match self {
            Kernel::Gaussian => (-0.5 * u * u).exp(),
            Kernel::Exponential => (-u).exp(),
            Kernel::Bisquare => {
                if u < 1.0 {
                    let t = 1.0 - u * u;
                    t * t
                } else {
                    0.0
                }
            }
            Kernel::Tricube => {
                if u < 1.0 {
                    let t = 1.0 - u * u * u;
                    t * t * t
                } else {
                    0.0
                }
            }
            Kernel::Boxcar => {
                if u < 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kernel::Gaussian => "gaussian",
            Kernel::Exponential => "exponential",
            Kernel::Bisquare => "bisquare",
            Kernel::Tricube => "tricube",
            Kernel::Boxcar => "boxcar",
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kernel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gaussian" | "gauss" => Ok(Kernel::Gaussian),
            "exponential" | "exp" => Ok(Kernel::Exponential),
            "bisquare" | "biweight" => Ok(Kernel::Bisquare),
            "tricube" => Ok(Kernel::Tricube),
            "boxcar" | "uniform" => Ok(Kernel::Boxcar),
            _ => Err(Error::invalid(
                "kernel",
                s,
                "use gaussian, exponential, bisquare, tricube or boxcar",
            )),
        }
    }
}

/// Kernel bandwidth: a distance (fixed) or a neighbor count (adaptive)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bandwidth {
    /// One distance shared by every location
    Fixed(f64),
    /// Per-location distance to the K-th nearest location (self counts as first)
    Adaptive(usize),
}

impl Bandwidth {
    pub fn is_adaptive(&self) -> bool {
        matches!(self, Bandwidth::Adaptive(_))
    }

    /// Numeric value (distance or count) for reporting
    pub fn value(&self) -> f64 {
        match *self {
            Bandwidth::Fixed(h) => h,
            Bandwidth::Adaptive(k) => k as f64,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Bandwidth::Fixed(h) if h.is_nan() || h <= 0.0 => {
                Err(Error::invalid("bandwidth", h, "must be a positive distance"))
            }
            Bandwidth::Adaptive(k) if k < 2 => Err(Error::invalid(
                "neighbors",
                k,
                "adaptive bandwidth needs at least 2 neighbors",
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bandwidth::Fixed(h) => write!(f, "{:.6} (fixed distance)", h),
            Bandwidth::Adaptive(k) => write!(f, "{} nearest neighbors (adaptive)", k),
        }
    }
}

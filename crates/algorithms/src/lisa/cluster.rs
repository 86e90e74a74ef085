//! LISA cluster categories and their legacy numeric codes

use std::fmt;

/// Cluster category of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LisaCluster {
    NotSignificant,
    HighHigh,
    LowLow,
    LowHigh,
    HighLow,
    /// Statistic not finite or permutation distribution degenerate
    Undefined,
    /// No neighbors
    Isolated,
}

impl LisaCluster {
    /// Every category, in code order
    pub const ALL: [LisaCluster; 7] = [
        LisaCluster::NotSignificant,
        LisaCluster::HighHigh,
        LisaCluster::LowLow,
        LisaCluster::LowHigh,
        LisaCluster::HighLow,
        LisaCluster::Undefined,
        LisaCluster::Isolated,
    ];

    pub fn code(self) -> i64 {
        match self {
            LisaCluster::NotSignificant => 0,
            LisaCluster::HighHigh => 1,
            LisaCluster::LowLow => 2,
            LisaCluster::LowHigh => 3,
            LisaCluster::HighLow => 4,
            LisaCluster::Undefined => 5,
            LisaCluster::Isolated => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LisaCluster::NotSignificant => "Not significant",
            LisaCluster::HighHigh => "High-High",
            LisaCluster::LowLow => "Low-Low",
            LisaCluster::LowHigh => "Low-High",
            LisaCluster::HighLow => "High-Low",
            LisaCluster::Undefined => "Undefined",
            LisaCluster::Isolated => "Isolated",
        }
    }

    /// Whether this is one of the four significant quadrants
    pub fn is_significant(self) -> bool {
        matches!(
            self,
            LisaCluster::HighHigh | LisaCluster::LowLow | LisaCluster::LowHigh | LisaCluster::HighLow
        )
    }

    /// Categorize an observation.
    ///
    /// Isolation overrides everything, then an undefined statistic; the
    /// quadrant comes from the sign of the value `z` and of its spatial lag.
    pub fn classify(isolated: bool, defined: bool, z: f64, lag: f64, p_value: f64, significance: f64) -> Self {
        if isolated {
            return LisaCluster::Isolated;
        }
        if !defined {
            return LisaCluster::Undefined;
        }
        if p_value > significance {
            return LisaCluster::NotSignificant;
        }
        match (z > 0.0, lag > 0.0) {
            (true, true) => LisaCluster::HighHigh,
            (true, false) => LisaCluster::HighLow,
            (false, true) => LisaCluster::LowHigh,
            (false, false) => LisaCluster::LowLow,
        }
    }
}

impl fmt::Display for LisaCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//! Viseme tiers - discrete mouth shapes derived from openness
//!
//! A tier is never stored on its own. It is recomputed from the current
//! openness every tick so it can never disagree with its input.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Openness at or above which a three-tier rig shows the loud mouth
pub const LOUD_CUT: f32 = 0.75;
/// Openness at or above which a three-tier rig shows the open mouth
pub const OPEN_CUT: f32 = 0.25;
/// Openness above which a two-tier rig shows the open mouth
pub const TWO_TIER_CUT: f32 = 0.5;

/// How many mouth shapes the rig has
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMode {
    /// Closed and open only; loud collapses into open
    TwoTier,
    /// Closed, open and loud
    #[default]
    ThreeTier,
}

/// Discrete mouth shape
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisemeTier {
    #[default]
    Closed,
    Open,
    Loud,
}

impl VisemeTier {
    /// Derive the tier from a smoothed openness value
    pub fn from_openness(openness: f32, mode: TierMode) -> Self {
        if !openness.is_finite() {
            return VisemeTier::Closed;
        }

        match mode {
            TierMode::ThreeTier => {
                if openness >= LOUD_CUT {
                    VisemeTier::Loud
                } else if openness >= OPEN_CUT {
                    VisemeTier::Open
                } else {
                    VisemeTier::Closed
                }
            }
            TierMode::TwoTier => {
                if openness > TWO_TIER_CUT {
                    VisemeTier::Open
                } else {
                    VisemeTier::Closed
                }
            }
        }
    }

    /// The mouth role made visible for this tier
    pub fn visible_role(self) -> Role {
        match self {
            VisemeTier::Closed => Role::Closed,
            VisemeTier::Open => Role::Open,
            VisemeTier::Loud => Role::Loud,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VisemeTier::Closed => "closed",
            VisemeTier::Open => "open",
            VisemeTier::Loud => "loud",
        }
    }
}

impl fmt::Display for VisemeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! XP to level progression.
//!
//! Level 0 takes `base_xp` to complete and every following level takes
//! `round(previous * multiplier)`. Levels are always derived from cumulative
//! XP and never stored, so any jump in XP (catching up after being offline,
//! a large reward) lands on the right level.

use serde::{Deserialize, Serialize};

pub const BASE_XP: u64 = 20;
pub const XP_MULTIPLIER: f64 = 1.2;

/// Shape of the XP curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelCurve {
    pub base_xp: u64,
    pub multiplier: f64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            base_xp: BASE_XP,
            multiplier: XP_MULTIPLIER,
        }
    }
}

/// Level and in-level progress derived from cumulative XP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    /// 0.0 ..= 100.0
    pub progress_percent: f64,
    pub xp_into_level: u64,
    pub xp_for_level: u64,
}

impl LevelProgress {
    /// XP still missing to complete the current level.
    pub fn xp_to_next_level(&self) -> u64 {
        self.xp_for_level.saturating_sub(self.xp_into_level)
    }
}

/// Result of applying a non-negative XP delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpApplication {
    pub new_xp: u64,
    pub did_level_up: bool,
    pub old_level: u32,
    pub new_level: u32,
}

/// A crossed level boundary, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub old_level: u32,
    pub new_level: u32,
}

impl XpApplication {
    pub fn level_up(&self) -> Option<LevelUp> {
        self.did_level_up.then_some(LevelUp {
            old_level: self.old_level,
            new_level: self.new_level,
        })
    }
}

/// Cumulative XP of the signed-in user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceState {
    pub cumulative_xp: u64,
}

impl ExperienceState {
    pub fn new(cumulative_xp: u64) -> Self {
        Self { cumulative_xp }
    }

    pub fn progress(&self, curve: &LevelCurve) -> LevelProgress {
        curve.level_from_xp(clamp_i64(self.cumulative_xp))
    }

    /// Apply `delta` in place. Negative deltas leave the state untouched.
    pub fn apply(&mut self, curve: &LevelCurve, delta: i64) -> Option<XpApplication> {
        let applied = curve.apply_xp_delta(self.cumulative_xp, delta)?;
        self.cumulative_xp = applied.new_xp;
        Some(applied)
    }
}

impl LevelCurve {
    pub fn new(base_xp: u64, multiplier: f64) -> Self {
        Self {
            base_xp,
            multiplier,
        }
    }

    fn next_requirement(&self, current: u64) -> u64 {
        let next = (current as f64 * self.multiplier).round();
        if next >= u64::MAX as f64 {
            u64::MAX
        } else {
            next as u64
        }
    }

    /// Level and progress for `xp`. Negative XP counts as zero.
    pub fn level_from_xp(&self, xp: i64) -> LevelProgress {
        let xp = xp.max(0) as u64;

        let mut level: u32 = 0;
        let mut requirement = self.base_xp;
        let mut accumulated: u64 = 0;

        // A zero requirement would never advance; treat it as the top level.
        while requirement > 0 {
            let threshold = match accumulated.checked_add(requirement) {
                Some(t) => t,
                None => break,
            };
            if xp < threshold {
                break;
            }
            level = level.saturating_add(1);
            accumulated = threshold;
            let next = self.next_requirement(requirement);
            if next == requirement {
                // Flat from here on: every remaining level costs the same.
                let remaining = (xp - accumulated) / requirement;
                level = level.saturating_add(u32::try_from(remaining).unwrap_or(u32::MAX));
                accumulated += remaining * requirement;
                break;
            }
            requirement = next;
        }

        let xp_into_level = xp - accumulated;
        let progress_percent = if requirement > 0 {
            (100.0 * xp_into_level as f64 / requirement as f64).clamp(0.0, 100.0)
        } else {
            100.0
        };

        LevelProgress {
            level,
            progress_percent,
            xp_into_level,
            xp_for_level: requirement,
        }
    }

    /// Apply an XP delta to `prior_xp`. Returns `None` when `delta < 0`.
    pub fn apply_xp_delta(&self, prior_xp: u64, delta: i64) -> Option<XpApplication> {
        if delta < 0 {
            return None;
        }
        let new_xp = prior_xp.saturating_add(delta as u64);
        let old_level = self.level_from_xp(clamp_i64(prior_xp)).level;
        let new_level = self.level_from_xp(clamp_i64(new_xp)).level;

        Some(XpApplication {
            new_xp,
            did_level_up: new_level > old_level,
            old_level,
            new_level,
        })
    }

    /// XP missing until the next level boundary.
    pub fn xp_to_next_level(&self, xp: i64) -> u64 {
        self.level_from_xp(xp).xp_to_next_level()
    }
}

fn clamp_i64(xp: u64) -> i64 {
    i64::try_from(xp).unwrap_or(i64::MAX)
}

/// [`LevelCurve::level_from_xp`] on the default curve.
pub fn level_from_xp(xp: i64) -> LevelProgress {
    LevelCurve::default().level_from_xp(xp)
}

/// [`LevelCurve::apply_xp_delta`] on the default curve.
pub fn apply_xp_delta(prior_xp: u64, delta: i64) -> Option<XpApplication> {
    LevelCurve::default().apply_xp_delta(prior_xp, delta)
}

use clap::Subcommand;
use pawcare_core::storage::JsonFileStore;
use pawcare_core::{Config, LevelCurve, UserProfile};
use serde_json::json;

use crate::app::CliResult;

#[derive(Subcommand)]
pub enum LevelAction {
    /// Level and progress for an XP total
    Show {
        /// Cumulative XP; defaults to the cached profile
        #[arg(long)]
        xp: Option<u64>,
    },
    /// Preview the effect of an XP delta
    Apply {
        /// XP gained (negative deltas are ignored)
        #[arg(allow_hyphen_values = true)]
        delta: i64,
        /// Cumulative XP before the delta; defaults to the cached profile
        #[arg(long)]
        xp: Option<u64>,
    },
}

pub fn run(action: LevelAction) -> CliResult {
    let curve = Config::load()?.progression.curve()?;
    match action {
        LevelAction::Show { xp } => {
            let xp = resolve_xp(xp)?;
            let progress = curve.level_from_xp(i64::try_from(xp).unwrap_or(i64::MAX));
            let report = json!({
                "xp": xp,
                "level": progress.level,
                "progressPercent": progress.progress_percent,
                "xpIntoLevel": progress.xp_into_level,
                "xpForLevel": progress.xp_for_level,
                "xpToNextLevel": progress.xp_to_next_level(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        LevelAction::Apply { delta, xp } => {
            let xp = resolve_xp(xp)?;
            println!("{}", serde_json::to_string_pretty(&preview(&curve, xp, delta))?);
        }
    }
    Ok(())
}

fn preview(curve: &LevelCurve, xp: u64, delta: i64) -> serde_json::Value {
    match curve.apply_xp_delta(xp, delta) {
        Some(applied) => json!({
            "applied": true,
            "newXp": applied.new_xp,
            "oldLevel": applied.old_level,
            "newLevel": applied.new_level,
            "didLevelUp": applied.did_level_up,
        }),
        None => json!({ "applied": false, "newXp": xp }),
    }
}

fn resolve_xp(explicit: Option<u64>) -> CliResult<u64> {
    if let Some(xp) = explicit {
        return Ok(xp);
    }
    let store = JsonFileStore::open_default()?;
    Ok(UserProfile::load(&store)?.map_or(0, |p| p.xp))
}

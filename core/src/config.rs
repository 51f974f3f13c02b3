//! Runtime configuration. One plain struct, following the teacher's
//! `Config` pattern: public fields, a `::new()`/`Default` constructor with
//! named constant defaults, `Serialize`/`Deserialize` so it can round-trip
//! through a TOML file. No module-level mutable state: tables that look
//! "global" in the Python reference (`DEATH_NOTE`, `CARD_CONFLICT_RULES`,
//! `FAN_LV_BONUS`) live here as fields with documented defaults.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_BATCH_SIZE: usize = 1_000_000;
const DEFAULT_CHUNK_SIZE: usize = 500;
const DEFAULT_MASTER_LEVEL: u32 = 50;

/// Which Fan-Level singing-count correction table applies to `pt`
/// computation (spec §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SeasonMode {
    /// No singing-count correction table; multiplier is always 1.0.
    Flat,
    Sukushow,
    Sukuste,
}

impl Default for SeasonMode {
    fn default() -> Self {
        SeasonMode::Flat
    }
}

impl SeasonMode {
    /// `singing_count_correction(mode, |singers|)` from spec §4.G.
    pub fn singing_count_correction(self, singer_count: usize) -> f64 {
        let table: &[(usize, f64)] = match self {
            SeasonMode::Flat => return 1.0,
            SeasonMode::Sukushow => &[(2, 2.75), (8, 1.00), (9, 0.90)],
            SeasonMode::Sukuste => &[(2, 2.33), (8, 1.00)],
        };
        table
            .iter()
            .find(|(count, _)| *count == singer_count)
            .map(|(_, mult)| *mult)
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Number of completed simulation tasks accumulated in memory before a
    /// shard file is flushed and the in-memory batch is cleared.
    pub batch_size: usize,
    /// Number of generator tasks handed to a worker in one chunk.
    pub chunk_size: usize,
    /// Worker-pool size; `None` means "logical CPU count" (`num_cpus::get()`).
    pub worker_count: Option<usize>,
    /// Player master level, 1..=50, used in `base_score` and in pt's
    /// limit-break lookup.
    pub master_level: u32,
    /// Season mode gating the Fan-Level singing-count correction table.
    pub season_mode: SeasonMode,
    /// Fan-Level -> bonus percentage, keyed by fan level 1..=10.
    pub fan_level_bonus: HashMap<u32, f64>,
    /// Card series id -> HP-rate threshold (percent, 0..100) that enables
    /// Death-Note AFK mode when the card is in the deck (spec §4.E).
    pub death_note: HashMap<i64, f64>,
    /// Symmetric-if-present forbidden-pair table: if a deck contains a key
    /// card, it may not also contain any of the paired values.
    pub card_conflicts: HashMap<i64, Vec<i64>>,
    /// Whether pt is computed for mined decks at all (spec §4.G / §6: "no
    /// key for `pt` when pt not computed").
    pub compute_pt: bool,
    /// Character id -> fan level (1..=10), used by `pt`'s `BONUS_SFL` term.
    /// A character missing from this table defaults to fan level 10,
    /// matching `MainBatch.py`'s `FAN_LEVELS.get(cid, 10)`.
    pub character_fan_levels: HashMap<i64, u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_count: None,
            master_level: DEFAULT_MASTER_LEVEL,
            season_mode: SeasonMode::default(),
            fan_level_bonus: default_fan_level_bonus(),
            death_note: default_death_note(),
            card_conflicts: default_card_conflicts(),
            compute_pt: true,
            character_fan_levels: HashMap::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.display().to_string())
            } else {
                ConfigError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&text)?;
        Ok(config)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(num_cpus::get).max(1)
    }

    /// `points_for_level(L)` from spec §3 invariants.
    pub fn points_for_level(level: i64) -> i64 {
        if level <= 20 {
            5 * level * (level + 1)
        } else {
            200 * level - 1900
        }
    }

    /// `LIMITBREAK_BONUS[level]` from spec §4.G.
    pub fn limitbreak_bonus(level: u32) -> f64 {
        match level {
            0..=10 => 1.0,
            11 => 1.2,
            12 => 1.3,
            13 => 1.35,
            14 => 1.4,
            _ => 1.4,
        }
    }

    /// `FAN_LEVELS.get(cid, 10)`, clamped to the table's 1..=10 domain.
    pub fn fan_level_for(&self, character_id: i64) -> u32 {
        self.character_fan_levels.get(&character_id).copied().unwrap_or(10).clamp(1, 10)
    }
}

/// `FAN_LV_BONUS` table from spec §4.G.
fn default_fan_level_bonus() -> HashMap<u32, f64> {
    [
        (1, 0.0),
        (2, 0.20),
        (3, 0.275),
        (4, 0.35),
        (5, 0.425),
        (6, 0.50),
        (7, 0.55),
        (8, 0.60),
        (9, 0.65),
        (10, 0.70),
    ]
    .into_iter()
    .collect()
}

/// DEATH_NOTE thresholds, ported from `original_source/CardLevelConfig.py`.
/// Card series id -> minimum HP-rate percentage at which AFK MISS stops.
fn default_death_note() -> HashMap<i64, f64> {
    [(1041513, 10.0), (1041901, 25.0)].into_iter().collect()
}

/// CARD_CONFLICT_RULES, ported from `original_source/src/deck_gen/DeckGen2.py`.
fn default_card_conflicts() -> HashMap<i64, Vec<i64>> {
    let group = vec![
        1041513, 1042515, 1043515, 1031531, 1041516, 1032529, 1043516,
    ];
    [
        (1031530, group.clone()),
        (1032528, group.clone()),
        (1033524, group),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_for_level_matches_quadratic_and_linear_branches() {
        assert_eq!(Config::points_for_level(0), 0);
        assert_eq!(Config::points_for_level(1), 10);
        assert_eq!(Config::points_for_level(20), 2100);
        assert_eq!(Config::points_for_level(21), 2300);
    }

    #[test]
    fn limitbreak_bonus_matches_table() {
        assert_eq!(Config::limitbreak_bonus(1), 1.0);
        assert_eq!(Config::limitbreak_bonus(10), 1.0);
        assert_eq!(Config::limitbreak_bonus(11), 1.2);
        assert_eq!(Config::limitbreak_bonus(14), 1.4);
    }

    #[test]
    fn season_mode_correction_falls_back_to_one() {
        assert_eq!(SeasonMode::Sukushow.singing_count_correction(2), 2.75);
        assert_eq!(SeasonMode::Sukushow.singing_count_correction(5), 1.0);
        assert_eq!(SeasonMode::Flat.singing_count_correction(2), 1.0);
    }

    #[test]
    fn default_config_loads_nonempty_tables() {
        let cfg = Config::default();
        assert!(!cfg.fan_level_bonus.is_empty());
        assert!(cfg.death_note.contains_key(&1041513));
        assert!(cfg.card_conflicts.contains_key(&1031530));
    }
}

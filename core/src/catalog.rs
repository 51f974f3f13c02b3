//! The static data model (component A): an immutable, process-wide lookup
//! of card/skill/center-skill/center-attribute/music records, loaded once
//! from JSON and shared read-only across workers.
//!
//! Field names mirror the external interface in `SPEC_FULL.md` §6, which in
//! turn mirrors the Python reference's `RCardData`/`RDeck`/`RSkill` record
//! shapes after `generic_yaml_to_json` flattens per-level rows into
//! per-series arrays.

use crate::error::CatalogLoadError;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Rarity codes, deliberately not in power order (see Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(i64)]
pub enum Rarity {
    R = 3,
    SR = 4,
    UR = 5,
    LR = 7,
    DR = 8,
    BR = 9,
}

impl Rarity {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            3 => Rarity::R,
            4 => Rarity::SR,
            5 => Rarity::UR,
            7 => Rarity::LR,
            8 => Rarity::DR,
            9 => Rarity::BR,
            _ => return None,
        })
    }

    pub fn is_dr(self) -> bool {
        matches!(self, Rarity::DR)
    }
}

/// A piecewise-linear curve: sorted `(level, value)` control points.
type Curve = &'static [(i64, f64)];

/// `STATUS_CURVES` from `RDeck.py`: stat percentage by card level.
static STATUS_CURVES: Lazy<HashMap<Rarity, Vec<(i64, f64)>>> = Lazy::new(|| {
    use Rarity::*;
    [
        (R, vec![(1, 1.0), (30, 50.0), (40, 70.0), (60, 100.0), (70, 110.0), (80, 120.0)]),
        (SR, vec![(1, 1.0), (40, 50.0), (60, 70.0), (80, 100.0), (90, 110.0), (100, 120.0)]),
        (UR, vec![(1, 1.0), (60, 50.0), (80, 70.0), (100, 100.0), (110, 110.0), (120, 120.0)]),
        (LR, vec![(1, 1.0), (100, 70.0), (120, 100.0), (130, 110.0), (140, 120.0)]),
        (DR, vec![(1, 1.0), (100, 70.0), (120, 100.0), (130, 110.0), (140, 120.0)]),
        (BR, vec![(1, 1.0), (80, 70.0), (100, 100.0), (110, 110.0), (120, 120.0)]),
    ]
    .into_iter()
    .collect()
});

/// `HP_CURVES` from `RDeck.py`: HP percentage by card level.
static HP_CURVES: Lazy<HashMap<Rarity, Vec<(i64, f64)>>> = Lazy::new(|| {
    use Rarity::*;
    [
        (R, vec![(1, 20.0), (30, 50.0), (40, 70.0), (60, 100.0)]),
        (SR, vec![(1, 20.0), (40, 50.0), (60, 70.0), (80, 100.0)]),
        (UR, vec![(1, 20.0), (60, 50.0), (80, 70.0), (100, 100.0)]),
        (LR, vec![(1, 20.0), (100, 70.0), (120, 100.0)]),
        (DR, vec![(1, 20.0), (100, 70.0), (120, 100.0)]),
        (BR, vec![(1, 20.0), (80, 70.0), (100, 100.0)]),
    ]
    .into_iter()
    .collect()
});

/// `EVOLUTION` from `RDeck.py`: level thresholds to evolution stage (0..4).
/// Rhythm-game training stage 1 shares training 0's skill id and is folded
/// in upstream, so there is no `(.., 1)` entry here.
static EVOLUTION: Lazy<HashMap<Rarity, Vec<(i64, i64)>>> = Lazy::new(|| {
    use Rarity::*;
    [
        (R, vec![(40, 0), (60, 2), (70, 3), (80, 4)]),
        (SR, vec![(60, 0), (80, 2), (90, 3), (100, 4)]),
        (UR, vec![(80, 0), (100, 2), (110, 3), (120, 4)]),
        (LR, vec![(100, 0), (120, 2), (130, 3), (140, 4)]),
        (DR, vec![(100, 0), (120, 2), (130, 3), (140, 4)]),
        (BR, vec![(80, 0), (100, 2), (110, 3), (120, 4)]),
    ]
    .into_iter()
    .collect()
});

fn interpolate(curve: &[(i64, f64)], level: i64) -> f64 {
    if level <= curve[0].0 {
        return curve[0].1;
    }
    for window in curve.windows(2) {
        let (lv_start, val_start) = window[0];
        let (lv_end, val_end) = window[1];
        if level <= lv_end {
            let t = (level - lv_start) as f64 / (lv_end - lv_start) as f64;
            return val_start + t * (val_end - val_start);
        }
    }
    curve.last().unwrap().1
}

/// `status_norm, hp_norm = _get_card_status(rarity, level)`.
pub fn status_and_hp_norm(rarity: Rarity, level: i64) -> (f64, f64) {
    let status = interpolate(&STATUS_CURVES[&rarity], level);
    let hp = interpolate(&HP_CURVES[&rarity], level);
    (status, hp)
}

/// `_get_evolution(rarity, level)`.
pub fn evolution_stage_at_level(rarity: Rarity, level: i64) -> i64 {
    let stages = &EVOLUTION[&rarity];
    for (limit, stage) in stages {
        if level <= *limit {
            return *stage;
        }
    }
    stages.last().unwrap().1
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CardRecord {
    pub card_series_id: i64,
    pub name: String,
    pub description: String,
    pub characters_id: i64,
    pub rarity: i64,
    pub center_skill_series_id: i64,
    pub center_attribute_series_id: i64,
    pub max_smile: Vec<i64>,
    pub max_pure: Vec<i64>,
    pub max_cool: Vec<i64>,
    pub max_mental: Vec<i64>,
    pub rhythm_game_skill_series_id: Vec<i64>,
}

impl CardRecord {
    pub fn rarity(&self) -> Option<Rarity> {
        Rarity::from_code(self.rarity)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SkillRecord {
    pub rhythm_game_skill_condition_ids: Vec<String>,
    pub rhythm_game_skill_effect_id: Vec<i64>,
    pub consume_ap: i64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CenterSkillRecord {
    pub center_skill_condition_ids: Vec<String>,
    pub center_skill_effect_id: Vec<i64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CenterAttributeRecord {
    pub target_ids: Vec<String>,
    pub center_attribute_effect_id: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i64)]
pub enum MusicType {
    Smile = 1,
    Pure = 2,
    Cool = 3,
}

impl MusicType {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => MusicType::Smile,
            2 => MusicType::Pure,
            3 => MusicType::Cool,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MusicRecord {
    pub id: i64,
    pub title: String,
    pub music_type: i64,
    pub center_character_id: i64,
    pub singer_character_id: Vec<i64>,
    pub play_time_ms: i64,
    pub fever_section_no: i64,
}

/// The immutable catalog: every table keyed by its series/skill id, loaded
/// once at startup and shared read-only across all worker threads.
#[derive(Debug, Default)]
pub struct Catalog {
    cards: HashMap<i64, CardRecord>,
    skills: HashMap<i64, SkillRecord>,
    center_skills: HashMap<i64, CenterSkillRecord>,
    center_attributes: HashMap<i64, CenterAttributeRecord>,
    musics: HashMap<i64, MusicRecord>,
}

impl Catalog {
    pub fn load(
        cards_path: impl AsRef<std::path::Path>,
        skills_path: impl AsRef<std::path::Path>,
        center_skills_path: impl AsRef<std::path::Path>,
        center_attributes_path: impl AsRef<std::path::Path>,
        musics_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, CatalogLoadError> {
        let cards: HashMap<i64, CardRecord> = load_json_table(cards_path)?;
        let skills: HashMap<i64, SkillRecord> = load_json_table(skills_path)?;
        let center_skills: HashMap<i64, CenterSkillRecord> = load_json_table(center_skills_path)?;
        let center_attributes: HashMap<i64, CenterAttributeRecord> =
            load_json_table(center_attributes_path)?;
        let musics: HashMap<i64, MusicRecord> = load_json_table(musics_path)?;

        let mut seen = std::collections::HashSet::new();
        for id in cards.keys() {
            if !seen.insert(*id) {
                return Err(CatalogLoadError::DuplicateSeriesId(*id));
            }
        }

        Ok(Self {
            cards,
            skills,
            center_skills,
            center_attributes,
            musics,
        })
    }

    pub fn card(&self, series_id: i64) -> Option<&CardRecord> {
        self.cards.get(&series_id)
    }

    /// `Skill.__init__`: `skill_id = series_id*100 + level`.
    pub fn skill(&self, series_id: i64, level: i64) -> Option<&SkillRecord> {
        self.skills.get(&(series_id * 100 + level))
    }

    /// `CenterSkill.__init__`: `series_id == 0` means "no center skill".
    pub fn center_skill(&self, series_id: i64, level: i64) -> Option<&CenterSkillRecord> {
        if series_id == 0 {
            return None;
        }
        self.center_skills.get(&(series_id * 100 + level))
    }

    /// `CenterAttribute.__init__`: keyed by `series_id + 1`, `0` means none.
    pub fn center_attribute(&self, series_id: i64) -> Option<&CenterAttributeRecord> {
        if series_id == 0 {
            return None;
        }
        self.center_attributes.get(&(series_id + 1))
    }

    pub fn music(&self, id: i64) -> Option<&MusicRecord> {
        self.musics.get(&id)
    }

    /// Every card series id in the catalog, in arbitrary order — the
    /// default card pool for a driver that wants "mine against everything".
    pub fn card_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.cards.keys().copied()
    }
}

fn load_json_table<T: serde::de::DeserializeOwned>(
    path: impl AsRef<std::path::Path>,
) -> Result<HashMap<i64, T>, CatalogLoadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CatalogLoadError::NotFound(path.display().to_string())
        } else {
            CatalogLoadError::Io(e)
        }
    })?;
    let raw: HashMap<String, T> = serde_json::from_str(&text)?;
    raw.into_iter()
        .map(|(k, v)| {
            k.parse::<i64>()
                .map(|id| (id, v))
                .map_err(|_| CatalogLoadError::Malformed {
                    file: path.display().to_string(),
                    reason: format!("non-numeric key {k}"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_clamps_below_and_above_range() {
        let curve = [(1, 1.0), (30, 50.0), (60, 100.0)];
        assert_eq!(interpolate(&curve, 1), 1.0);
        assert_eq!(interpolate(&curve, 0), 1.0);
        assert_eq!(interpolate(&curve, 60), 100.0);
        assert_eq!(interpolate(&curve, 200), 100.0);
    }

    #[test]
    fn interpolate_midpoint_is_linear() {
        let curve = [(0, 0.0), (10, 100.0)];
        assert_eq!(interpolate(&curve, 5), 50.0);
    }

    #[test]
    fn evolution_stage_follows_rarity_thresholds() {
        assert_eq!(evolution_stage_at_level(Rarity::R, 1), 0);
        assert_eq!(evolution_stage_at_level(Rarity::R, 40), 0);
        assert_eq!(evolution_stage_at_level(Rarity::R, 61), 2);
        assert_eq!(evolution_stage_at_level(Rarity::R, 999), 4);
    }

    #[test]
    fn rarity_from_code_rejects_unknown() {
        assert_eq!(Rarity::from_code(3), Some(Rarity::R));
        assert_eq!(Rarity::from_code(8), Some(Rarity::DR));
        assert_eq!(Rarity::from_code(6), None);
    }

    #[test]
    fn catalog_load_reports_missing_file() {
        let err = Catalog::load(
            "/nonexistent/cards.json",
            "/nonexistent/skills.json",
            "/nonexistent/center_skills.json",
            "/nonexistent/center_attributes.json",
            "/nonexistent/musics.json",
        )
        .unwrap_err();
        assert!(matches!(err, CatalogLoadError::NotFound(_)));
    }
}

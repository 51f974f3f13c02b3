//! Live cards (component C): a [`LiveCard`] is a catalog entry materialized
//! at a specific level triple — current stats, bound skill/center-skill/
//! center-attribute ids, and the deck-local mutable state (`cost`,
//! `active_count`, `is_except`). Ports `RDeck.py`'s `Card` class.

use crate::catalog::{Catalog, Rarity};
use crate::error::CatalogLoadError;

/// `(condition_ids, effect_ids)` bound to one skill slot. Condition ids are
/// kept as raw strings — possibly comma-joined 7-digit fields, or the
/// literal `"0"` — and parsed lazily by the resolver.
#[derive(Debug, Clone, Default)]
pub struct SkillBinding {
    pub condition_ids: Vec<String>,
    pub effect_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CenterAttributeBinding {
    pub target_ids: Vec<String>,
    pub effect_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct LiveCard {
    pub card_series_id: i64,
    pub characters_id: i64,
    pub rarity: Rarity,
    pub card_level: i64,
    pub evolution_stage: i64,
    /// Smile/Pure/Cool are mutated in place by `CenterAttributeEffect` rate
    /// and value changes (`card.smile *= multiplier` in the Python
    /// reference), so they stay floating-point for the lifetime of a play
    /// rather than the integer stat a card is catalogued with.
    pub smile: f64,
    pub pure: f64,
    pub cool: f64,
    pub mental: i64,
    pub cost: i64,
    pub center_attribute: Option<CenterAttributeBinding>,
    pub center_skill: Option<SkillBinding>,
    pub skill: SkillBinding,
    pub active_count: u32,
    pub is_except: bool,
}

/// `lv_list` defaults from `RDeck.py`: `[140, 14, 14]`.
pub const DEFAULT_LEVELS: [i64; 3] = [140, 14, 14];

impl LiveCard {
    pub fn new(
        catalog: &Catalog,
        card_series_id: i64,
        levels: [i64; 3],
    ) -> Result<Self, CatalogLoadError> {
        let record = catalog
            .card(card_series_id)
            .ok_or(CatalogLoadError::Malformed {
                file: "catalog".into(),
                reason: format!("unknown card series id {card_series_id}"),
            })?;
        let rarity = record.rarity().ok_or_else(|| CatalogLoadError::Malformed {
            file: "catalog".into(),
            reason: format!("card {card_series_id} has unknown rarity code {}", record.rarity),
        })?;

        let [card_level, center_skill_level, skill_level] = levels;
        let (status_norm, hp_norm) = crate::catalog::status_and_hp_norm(rarity, card_level);
        let evolution_stage = crate::catalog::evolution_stage_at_level(rarity, card_level);

        // Stat curves are keyed to the max-stat array's evolution-stage-3
        // entry regardless of the card's actual current evolution stage —
        // evolution stage only ever selects which skill variant is bound,
        // never which max-stat array slot is read (RDeck.py `_init_status`
        // always indexes `[-3]` of the 5-element array).
        const STAT_REFERENCE_INDEX: usize = 2;
        let stat_at = |arr: &[i64]| -> f64 {
            let base = *arr.get(STAT_REFERENCE_INDEX).unwrap_or(&0) as f64;
            (base * status_norm / 100.0).ceil()
        };
        let smile = stat_at(&record.max_smile);
        let pure = stat_at(&record.max_pure);
        let cool = stat_at(&record.max_cool);
        let mental = {
            let base = *record.max_mental.get(STAT_REFERENCE_INDEX).unwrap_or(&0) as f64;
            (base * hp_norm / 100.0).ceil() as i64
        };

        let center_attribute = catalog
            .center_attribute(record.center_attribute_series_id)
            .map(|rec| CenterAttributeBinding {
                target_ids: rec.target_ids.clone(),
                effect_ids: rec.center_attribute_effect_id.clone(),
            });

        let center_skill = catalog
            .center_skill(record.center_skill_series_id, center_skill_level)
            .map(|rec| SkillBinding {
                condition_ids: rec.center_skill_condition_ids.clone(),
                effect_ids: rec.center_skill_effect_id.clone(),
            });

        let skill_series_id = skill_series_id(card_series_id, evolution_stage);
        let skill_record = catalog
            .skill(skill_series_id, skill_level)
            .ok_or_else(|| CatalogLoadError::Malformed {
                file: "catalog".into(),
                reason: format!(
                    "no skill record for card {card_series_id} (series {skill_series_id}, level {skill_level})"
                ),
            })?;
        let skill = SkillBinding {
            condition_ids: skill_record.rhythm_game_skill_condition_ids.clone(),
            effect_ids: skill_record.rhythm_game_skill_effect_id.clone(),
        };
        let cost = skill_record.consume_ap;

        Ok(LiveCard {
            card_series_id,
            characters_id: record.characters_id,
            rarity,
            card_level,
            evolution_stage,
            smile,
            pure,
            cool,
            mental,
            cost,
            center_attribute,
            center_skill,
            skill,
            active_count: 0,
            is_except: false,
        })
    }

    /// Returns this card's (condition, effect) pair and bumps `active_count`.
    pub fn fire_skill(&mut self) -> (Vec<String>, Vec<i64>) {
        self.active_count += 1;
        (self.skill.condition_ids.clone(), self.skill.effect_ids.clone())
    }

    pub fn cost_change(&mut self, value: i64) {
        self.cost = (self.cost + value).max(0);
    }
}

/// `int(f"3{card_id[1:]}{evo}")` from `RDeck.py` — drop the leading
/// character digit, keep rarity+variant, append the evolution stage.
fn skill_series_id(card_series_id: i64, evolution_stage: i64) -> i64 {
    let digits = card_series_id.to_string();
    let suffix = &digits[1..];
    format!("3{suffix}{evolution_stage}")
        .parse()
        .expect("card series id digits always parse")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_series_id_matches_reference_formula() {
        assert_eq!(skill_series_id(1041513, 2), 30415132);
        assert_eq!(skill_series_id(1011501, 0), 30115010);
    }
}

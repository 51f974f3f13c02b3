//! Center-card skills: phase-triggered conditions (7-digit, comma-AND,
//! compared against the firing event's name) and a 4-type effect subset.
//! Ports `SkillResolver.py`'s `CenterSkillConditionType`/
//! `CheckCenterSkillCondition`/`CenterSkillEffectType`/
//! `ApplyCenterSkillEffect`.

use crate::deck::Deck;
use crate::player::PlayerAttributes;

/// Which phase transition fired this check, mirroring the Python's
/// `event: str` parameter (`"LiveStart"`/`"LiveEnd"`/`"FeverStart"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    LiveStart,
    LiveEnd,
    FeverStart,
}

#[derive(Debug, Clone, Copy)]
enum CenterSkillCondition {
    LiveStart,
    LiveEnd,
    FeverStart,
    FeverTime,
    VoltageLevel { op: super::condition::ComparisonOperator, value: i64 },
    MentalRate { op: super::condition::ComparisonOperator, value: i64 },
    AfterUsedAllSkillCount { op: super::condition::ComparisonOperator, value: i64 },
}

impl CenterSkillCondition {
    fn parse(id: &str) -> Option<Self> {
        if id.len() != 7 {
            log::warn!("center-skill condition id '{id}' is not 7 digits, treating as unsatisfied");
            return None;
        }
        let condition_type: u8 = id[..1].parse().ok()?;
        let op_digit: u8 = id[1..2].parse().ok()?;
        let op = super::condition::ComparisonOperator::from_digit(op_digit)?;
        let value: i64 = id[2..].parse().ok()?;
        use CenterSkillCondition::*;
        match condition_type {
            1 => Some(LiveStart),
            2 => Some(LiveEnd),
            3 => Some(FeverStart),
            4 => Some(FeverTime),
            5 => Some(VoltageLevel { op, value }),
            6 => Some(MentalRate { op, value }),
            7 => Some(AfterUsedAllSkillCount { op, value }),
            other => {
                log::warn!("unknown center-skill condition type {other} in id '{id}'");
                None
            }
        }
    }
}

/// `CheckCenterSkillCondition`: every comma-joined condition must hold (AND).
pub fn check_center_skill_condition(
    player: &PlayerAttributes,
    deck: &Deck,
    condition_id: &str,
    event: Option<PhaseEvent>,
) -> bool {
    condition_id.split(',').all(|part| {
        let Some(condition) = CenterSkillCondition::parse(part) else {
            return false;
        };
        use CenterSkillCondition::*;
        match condition {
            LiveStart => event == Some(PhaseEvent::LiveStart),
            LiveEnd => event == Some(PhaseEvent::LiveEnd),
            FeverStart => event == Some(PhaseEvent::FeverStart),
            FeverTime => player.voltage.fever,
            VoltageLevel { op, value } => op.evaluate(player.voltage.level as f64, value as f64),
            MentalRate { op, value } => op.evaluate(player.mental.get_rate(), value as f64 / 100.0),
            AfterUsedAllSkillCount { op, value } => {
                op.evaluate(deck.used_all_skill_calc() as f64, value as f64)
            }
        }
    })
}

#[derive(Debug, Clone, Copy)]
enum CenterSkillEffect {
    ApChange { gain: bool, value: i64 },
    ScoreGain { value: i64 },
    VoltagePointChange { gain: bool, value: i64 },
    MentalRateChange { gain: bool, value: i64 },
}

impl CenterSkillEffect {
    fn parse(effect_id: i64) -> Option<Self> {
        let id = effect_id.to_string();
        if id.len() != 9 {
            log::warn!("center-skill effect id '{effect_id}' is not 9 digits, treating as no-op");
            return None;
        }
        let effect_type: u8 = id[..1].parse().ok()?;
        let change_direction: u8 = id[1..2].parse().ok()?;
        let gain = change_direction == 0;
        let value: i64 = id[2..].parse().ok()?;
        use CenterSkillEffect::*;
        match effect_type {
            1 => Some(ApChange { gain, value }),
            2 => Some(ScoreGain { value }),
            3 => Some(VoltagePointChange { gain, value }),
            4 => Some(MentalRateChange { gain, value }),
            other => {
                log::warn!("unknown center-skill effect type {other} in id '{effect_id}'");
                None
            }
        }
    }
}

/// `ApplyCenterSkillEffect`: identical arithmetic to the card-skill
/// `ApplySkillEffect` for the four shared effect types.
pub fn apply_center_skill_effect(player: &mut PlayerAttributes, effect_id: i64) {
    let Some(effect) = CenterSkillEffect::parse(effect_id) else {
        return;
    };
    use CenterSkillEffect::*;
    match effect {
        ApChange { gain, value } => {
            let ap_rate = player.ap_rate * player.ap_gain_rate / 100.0;
            let ap_amount = if gain {
                value as f64 * ap_rate / 10000.0
            } else {
                -(value as f64) / 10000.0
            };
            player.ap = (player.ap + ap_amount).max(0.0);
        }
        ScoreGain { value } => {
            let mut score_rate = 100.0;
            if !player.next_score_gain_rate.is_empty() {
                score_rate += player.next_score_gain_rate.remove(0);
            }
            let result = value as f64 * score_rate / 1_000_000.0;
            player.score_add(result, true);
        }
        VoltagePointChange { gain, value } => {
            let result = if gain {
                let mut voltage_rate = player.voltage_gain_rate;
                if !player.next_voltage_gain_rate.is_empty() {
                    voltage_rate += player.next_voltage_gain_rate.remove(0);
                }
                (value as f64 * voltage_rate / 100.0).ceil() as i64
            } else {
                -value
            };
            player.voltage.add_points(result);
        }
        MentalRateChange { gain, value } => {
            let hp_percent = value as f64 / 100.0;
            if gain {
                player.mental.skill_gain(hp_percent);
            } else {
                player.mental.skill_loss(hp_percent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_deck() -> Deck {
        use crate::catalog::Rarity;
        use crate::live_card::{LiveCard, SkillBinding};
        Deck::new(vec![LiveCard {
            card_series_id: 1,
            characters_id: 101,
            rarity: Rarity::R,
            card_level: 140,
            evolution_stage: 4,
            smile: 10.0,
            pure: 10.0,
            cool: 10.0,
            mental: 100,
            cost: 5,
            center_attribute: None,
            center_skill: None,
            skill: SkillBinding::default(),
            active_count: 0,
            is_except: false,
        }])
    }

    #[test]
    fn live_start_condition_matches_only_its_event() {
        let player = PlayerAttributes::new(50);
        let deck = stub_deck();
        assert!(check_center_skill_condition(&player, &deck, "1000000", Some(PhaseEvent::LiveStart)));
        assert!(!check_center_skill_condition(&player, &deck, "1000000", Some(PhaseEvent::LiveEnd)));
    }

    #[test]
    fn voltage_level_condition_is_numeric_not_event_based() {
        let mut player = PlayerAttributes::new(50);
        player.voltage.add_points(30);
        let deck = stub_deck();
        assert!(check_center_skill_condition(&player, &deck, "5100002", None));
    }

    #[test]
    fn center_skill_ap_change_matches_card_skill_formula() {
        let mut player = PlayerAttributes::new(50);
        player.ap_rate = 1.0;
        player.ap_gain_rate = 100.0;
        apply_center_skill_effect(&mut player, 100030000);
        assert_eq!(player.ap, 3.0);
    }
}

//! Card-skill trigger conditions: 7-digit `TDVVVVV` packed ids, or the
//! literal `"0"` for "always fires". Ports `SkillResolver.py`'s
//! `SkillConditionType`/`SkillComparisonOperator`/`parse_condition_id`/
//! `CheckSkillCondition`/`CheckMultiSkillCondition`.

use crate::deck::Deck;
use crate::live_card::LiveCard;
use crate::player::PlayerAttributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    /// No numeric check is performed; using this with a numeric condition
    /// type is a malformed-id case.
    Undefined,
    AboveOrEqual,
    BelowOrEqual,
}

impl ComparisonOperator {
    pub(crate) fn from_digit(d: u8) -> Option<Self> {
        match d {
            0 => Some(ComparisonOperator::Undefined),
            1 => Some(ComparisonOperator::AboveOrEqual),
            2 => Some(ComparisonOperator::BelowOrEqual),
            _ => None,
        }
    }

    pub(crate) fn evaluate(self, current: f64, required: f64) -> bool {
        match self {
            ComparisonOperator::Undefined => {
                log::warn!("comparison operator undefined for a numeric condition");
                false
            }
            ComparisonOperator::AboveOrEqual => current >= required,
            ComparisonOperator::BelowOrEqual => current <= required,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SkillCondition {
    FeverTime,
    VoltageLevel { op: ComparisonOperator, value: i64 },
    /// `value` is a percentage in hundredths (5000 = 50.00%).
    MentalRate { op: ComparisonOperator, value: i64 },
    UsedAllSkillCount { op: ComparisonOperator, value: i64 },
    UsedSkillCount { op: ComparisonOperator, value: i64 },
}

impl SkillCondition {
    pub fn parse(id: &str) -> Option<Self> {
        if id.len() != 7 {
            log::warn!("skill condition id '{id}' is not 7 digits, treating as unsatisfied");
            return None;
        }
        let condition_type: u8 = id[..1].parse().ok()?;
        let op_digit: u8 = id[1..2].parse().ok()?;
        let op = ComparisonOperator::from_digit(op_digit)?;
        let value: i64 = id[2..].parse().ok()?;
        match condition_type {
            1 => Some(SkillCondition::FeverTime),
            2 => Some(SkillCondition::VoltageLevel { op, value }),
            3 => Some(SkillCondition::MentalRate { op, value }),
            4 => Some(SkillCondition::UsedAllSkillCount { op, value }),
            5 => Some(SkillCondition::UsedSkillCount { op, value }),
            other => {
                log::warn!("unknown skill condition type {other} in id '{id}'");
                None
            }
        }
    }
}

/// `CheckSkillCondition`: the literal `"0"` always fires, comma-joined ids
/// are AND'd (recursively), otherwise a single condition is parsed and
/// evaluated. A malformed id is logged and treated as unsatisfied.
pub fn check_condition(
    player: &PlayerAttributes,
    deck: &Deck,
    card: Option<&LiveCard>,
    condition_id: &str,
) -> bool {
    let condition_id = condition_id.trim();
    if condition_id == "0" {
        return true;
    }
    if condition_id.contains(',') {
        return condition_id
            .split(',')
            .all(|part| check_condition(player, deck, card, part));
    }
    let Some(condition) = SkillCondition::parse(condition_id) else {
        return false;
    };
    match condition {
        SkillCondition::FeverTime => player.voltage.fever,
        SkillCondition::VoltageLevel { op, value } => {
            op.evaluate(player.voltage.level as f64, value as f64)
        }
        SkillCondition::MentalRate { op, value } => {
            op.evaluate(player.mental.get_rate(), value as f64 / 100.0)
        }
        SkillCondition::UsedAllSkillCount { op, value } => {
            op.evaluate(deck.used_all_skill_calc() as f64, value as f64)
        }
        SkillCondition::UsedSkillCount { op, value } => {
            let active_count = card.map(|c| c.active_count).unwrap_or(0);
            op.evaluate(active_count as f64, value as f64)
        }
    }
}

/// `CheckMultiSkillCondition`: AND across a list of (possibly already
/// comma-joined) condition ids.
pub fn check_multi_condition(
    player: &PlayerAttributes,
    deck: &Deck,
    card: Option<&LiveCard>,
    condition_ids: &[String],
) -> bool {
    condition_ids
        .iter()
        .all(|id| check_condition(player, deck, card, id))
}

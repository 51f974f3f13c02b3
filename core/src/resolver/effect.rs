//! Card-skill effects: 9-digit `TDAAAAAAA` packed ids (`TDUAAAAAA` for
//! T=7,8, where `U` is a usage count). Ports `SkillResolver.py`'s
//! `SkillEffectType`/`parse_effect_id`/`ApplySkillEffect`.

use crate::deck::Deck;
use crate::player::PlayerAttributes;

#[derive(Debug, Clone, Copy)]
pub enum SkillEffect {
    ApChange { gain: bool, value: i64 },
    /// The change-direction digit exists in the packed id but, per the
    /// Python reference, is never applied to the math here — only to a
    /// debug-log word. `ScoreGain` is always a net gain.
    ScoreGain { value: i64 },
    VoltagePointChange { gain: bool, value: i64 },
    MentalRateChange { gain: bool, value: i64 },
    DeckReset,
    CardExcept,
    NextScoreGainRate { usage_count: u8, value: i64 },
    NextVoltageGainRate { usage_count: u8, value: i64 },
}

impl SkillEffect {
    pub fn parse(effect_id: i64) -> Option<Self> {
        let id = effect_id.to_string();
        if id.len() != 9 {
            log::warn!("skill effect id '{effect_id}' is not 9 digits, treating as no-op");
            return None;
        }
        let effect_type: u8 = id[..1].parse().ok()?;
        let change_direction: u8 = id[1..2].parse().ok()?;
        let gain = change_direction == 0;
        match effect_type {
            1 => Some(SkillEffect::ApChange { gain, value: id[2..].parse().ok()? }),
            2 => Some(SkillEffect::ScoreGain { value: id[2..].parse().ok()? }),
            3 => Some(SkillEffect::VoltagePointChange { gain, value: id[2..].parse().ok()? }),
            4 => Some(SkillEffect::MentalRateChange { gain, value: id[2..].parse().ok()? }),
            5 => Some(SkillEffect::DeckReset),
            6 => Some(SkillEffect::CardExcept),
            7 => Some(SkillEffect::NextScoreGainRate {
                usage_count: id[2..3].parse().ok()?,
                value: id[3..].parse().ok()?,
            }),
            8 => Some(SkillEffect::NextVoltageGainRate {
                usage_count: id[2..3].parse().ok()?,
                value: id[3..].parse().ok()?,
            }),
            other => {
                log::warn!("unknown skill effect type {other} in id '{effect_id}'");
                None
            }
        }
    }
}

/// `ApplySkillEffect`. `card_index` identifies the firing card in
/// `deck.cards`, needed for `CardExcept`.
pub fn apply_effect(
    player: &mut PlayerAttributes,
    deck: &mut Deck,
    card_index: usize,
    effect_id: i64,
) {
    let Some(effect) = SkillEffect::parse(effect_id) else {
        return;
    };
    match effect {
        SkillEffect::ApChange { gain, value } => {
            let ap_rate = player.ap_rate * player.ap_gain_rate / 100.0;
            let ap_amount = if gain {
                value as f64 * ap_rate / 10000.0
            } else {
                -(value as f64) / 10000.0
            };
            player.ap = (player.ap + ap_amount).max(0.0);
        }
        SkillEffect::ScoreGain { value } => {
            let mut score_rate = 100.0;
            if !player.next_score_gain_rate.is_empty() {
                score_rate += player.next_score_gain_rate.remove(0);
            }
            let result = value as f64 * score_rate / 1_000_000.0;
            player.score_add(result, true);
        }
        SkillEffect::VoltagePointChange { gain, value } => {
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
        SkillEffect::MentalRateChange { gain, value } => {
            let hp_percent = value as f64 / 100.0;
            if gain {
                player.mental.skill_gain(hp_percent);
            } else {
                player.mental.skill_loss(hp_percent);
            }
        }
        SkillEffect::DeckReset => deck.reset(),
        SkillEffect::CardExcept => deck.except_and_clean(card_index),
        SkillEffect::NextScoreGainRate { usage_count, value } => {
            fill_or_append(&mut player.next_score_gain_rate, usage_count, value as f64 / 100.0)
        }
        SkillEffect::NextVoltageGainRate { usage_count, value } => {
            fill_or_append(&mut player.next_voltage_gain_rate, usage_count, value as f64 / 100.0)
        }
    }
}

/// Shared fill-or-append loop for `NextAPGainRateChange`/
/// `NextVoltageGainRateChange`: adds `bonus` to the first `usage_count`
/// queue slots, appending new slots once the queue runs out.
fn fill_or_append(queue: &mut Vec<f64>, usage_count: u8, bonus: f64) {
    for i in 0..usage_count as usize {
        if i < queue.len() {
            queue[i] += bonus;
        } else {
            queue.push(bonus);
        }
    }
}

/// `UseCardSkill`: evaluates every condition against the firing card, then
/// applies the effect at the same position whenever its condition held.
pub fn use_card_skill(
    player: &mut PlayerAttributes,
    deck: &mut Deck,
    card_index: usize,
    condition_ids: &[String],
    effect_ids: &[i64],
) {
    let flags: Vec<bool> = {
        let card = &deck.cards[card_index];
        condition_ids
            .iter()
            .map(|cond| super::condition::check_condition(player, deck, Some(card), cond))
            .collect()
    };
    for (flag, effect_id) in flags.into_iter().zip(effect_ids.iter()) {
        if flag {
            apply_effect(player, deck, card_index, *effect_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Rarity;
    use crate::live_card::{LiveCard, SkillBinding};

    fn stub_deck() -> Deck {
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
    fn ap_gain_applies_rate_loss_does_not() {
        let mut player = PlayerAttributes::new(50);
        player.ap_rate = 2.0;
        player.ap_gain_rate = 100.0;
        let mut deck = stub_deck();
        apply_effect(&mut player, &mut deck, 0, 100030000); // gain 3.0000
        assert_eq!(player.ap, 3.0 * 2.0);
        player.ap = 10.0;
        apply_effect(&mut player, &mut deck, 0, 110050000); // lose 5.0000
        assert_eq!(player.ap, 5.0);
    }

    #[test]
    fn voltage_point_gain_applies_rate_loss_is_raw() {
        let mut player = PlayerAttributes::new(50);
        let mut deck = stub_deck();
        apply_effect(&mut player, &mut deck, 0, 300000068); // +68 raw *1.0 rate
        assert_eq!(player.voltage.points(), 68);
        apply_effect(&mut player, &mut deck, 0, 310000050); // -50 raw, no rate
        assert_eq!(player.voltage.points(), 18);
    }

    #[test]
    fn deck_reset_and_card_except_fire() {
        let mut player = PlayerAttributes::new(50);
        let mut deck = stub_deck();
        apply_effect(&mut player, &mut deck, 0, 600000000);
        assert!(deck.cards[0].is_except);
    }

    #[test]
    fn next_score_gain_rate_fills_then_appends() {
        let mut player = PlayerAttributes::new(50);
        let mut deck = stub_deck();
        apply_effect(&mut player, &mut deck, 0, 701007962); // usage_count=1, value=7962
        assert_eq!(player.next_score_gain_rate, vec![79.62]);
        apply_effect(&mut player, &mut deck, 0, 702005000); // usage_count=2, value=5000
        assert_eq!(player.next_score_gain_rate, vec![129.62, 50.0]);
    }
}

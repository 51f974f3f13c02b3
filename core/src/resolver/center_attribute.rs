//! Center-attribute (passive, always-on) effects: 8-digit ids for types
//! 1..=9, 9-digit ids for types 10..=13. Ports `SkillResolver.py`'s
//! `CenterAttributeEffectType`/`ApplyCenterAttribute`.

use crate::deck::Deck;
use crate::player::PlayerAttributes;
use crate::resolver::target;

#[derive(Debug, Clone, Copy)]
pub enum CenterAttributeEffect {
    SmileRateChange { sign: i64, value: i64 },
    PureRateChange { sign: i64, value: i64 },
    CoolRateChange { sign: i64, value: i64 },
    SmileValueChange { sign: i64, value: i64 },
    PureValueChange { sign: i64, value: i64 },
    CoolValueChange { sign: i64, value: i64 },
    MentalRateChange { sign: i64, value: i64 },
    MentalValueChange { sign: i64, value: i64 },
    ConsumeApChange { sign: i64, value: i64 },
    CoolTimeChange { sign: i64, value: i64 },
    ApGainRateChange { sign: i64, value: i64 },
    VoltageGainRateChange { sign: i64, value: i64 },
    ApRateChangeResetGuard { sign: i64, value: i64 },
}

impl CenterAttributeEffect {
    pub fn parse(effect_id: i64) -> Option<Self> {
        let id = effect_id.to_string();
        let (enum_base_value, change_direction, value_data): (u8, u8, i64) = match id.len() {
            8 => (id[..1].parse().ok()?, id[1..2].parse().ok()?, id[2..].parse().ok()?),
            9 => (id[..2].parse().ok()?, id[2..3].parse().ok()?, id[3..].parse().ok()?),
            _ => {
                log::warn!("center-attribute effect id '{effect_id}' is not 8 or 9 digits, treating as no-op");
                return None;
            }
        };
        // 0 = increase, 1 = decrease.
        let sign: i64 = if change_direction == 0 { 1 } else { -1 };
        use CenterAttributeEffect::*;
        match enum_base_value {
            1 => Some(SmileRateChange { sign, value: value_data }),
            2 => Some(PureRateChange { sign, value: value_data }),
            3 => Some(CoolRateChange { sign, value: value_data }),
            4 => Some(SmileValueChange { sign, value: value_data }),
            5 => Some(PureValueChange { sign, value: value_data }),
            6 => Some(CoolValueChange { sign, value: value_data }),
            7 => Some(MentalRateChange { sign, value: value_data }),
            8 => Some(MentalValueChange { sign, value: value_data }),
            9 => Some(ConsumeApChange { sign, value: value_data }),
            10 => Some(CoolTimeChange { sign, value: value_data }),
            11 => Some(ApGainRateChange { sign, value: value_data }),
            12 => Some(VoltageGainRateChange { sign, value: value_data }),
            13 => Some(ApRateChangeResetGuard { sign, value: value_data }),
            other => {
                log::warn!("unknown center-attribute effect type {other} in id '{effect_id}'");
                None
            }
        }
    }
}

/// `ApplyCenterAttribute`. `target_ids`, when present, restricts which deck
/// cards the per-card variants (rate/value change on Smile/Pure/Cool/
/// Mental/cost) apply to; the player-scoped variants (cooldown, AP/Voltage
/// gain rate, AP rate) ignore targeting entirely, matching the Python
/// (those arms never read `target_cards`).
pub fn apply_center_attribute(
    player: &mut PlayerAttributes,
    deck: &mut Deck,
    effect_id: i64,
    target_ids: Option<&str>,
) {
    let Some(effect) = CenterAttributeEffect::parse(effect_id) else {
        return;
    };

    let matches_target = |characters_id: i64| -> bool {
        target_ids
            .map(|ids| target::matches_any(ids, characters_id))
            .unwrap_or(true)
    };

    use CenterAttributeEffect::*;
    match effect {
        // The rate-change variants never apply `sign` — the Python folds
        // `change_direction` only into the debug-log word here, not into
        // the multiplier itself.
        SmileRateChange { sign: _, value } => {
            let multiplier = 1.0 + value as f64 / 10000.0;
            for card in deck.cards.iter_mut().filter(|c| matches_target(c.characters_id)) {
                card.smile *= multiplier;
            }
        }
        PureRateChange { sign: _, value } => {
            let multiplier = 1.0 + value as f64 / 10000.0;
            for card in deck.cards.iter_mut().filter(|c| matches_target(c.characters_id)) {
                card.pure *= multiplier;
            }
        }
        CoolRateChange { sign: _, value } => {
            let multiplier = 1.0 + value as f64 / 10000.0;
            for card in deck.cards.iter_mut().filter(|c| matches_target(c.characters_id)) {
                card.cool *= multiplier;
            }
        }
        SmileValueChange { sign, value } => {
            for card in deck.cards.iter_mut().filter(|c| matches_target(c.characters_id)) {
                card.smile += (value * sign) as f64;
            }
        }
        PureValueChange { sign, value } => {
            for card in deck.cards.iter_mut().filter(|c| matches_target(c.characters_id)) {
                card.pure += (value * sign) as f64;
            }
        }
        CoolValueChange { sign, value } => {
            for card in deck.cards.iter_mut().filter(|c| matches_target(c.characters_id)) {
                card.cool += (value * sign) as f64;
            }
        }
        MentalRateChange { sign, value } => {
            let multiplier = 1.0 + (value as f64 / 10000.0) * sign as f64;
            for card in deck.cards.iter_mut().filter(|c| matches_target(c.characters_id)) {
                card.mental = (card.mental as f64 * multiplier).ceil() as i64;
            }
        }
        MentalValueChange { sign, value } => {
            for card in deck.cards.iter_mut().filter(|c| matches_target(c.characters_id)) {
                card.mental += value * sign;
            }
        }
        ConsumeApChange { sign, value } => {
            for card in deck.cards.iter_mut().filter(|c| matches_target(c.characters_id)) {
                card.cost_change(value * sign);
            }
        }
        CoolTimeChange { sign, value } => {
            let change_amount_seconds = value as f64 / 100.0;
            player.cooldown += change_amount_seconds * sign as f64;
        }
        ApGainRateChange { sign, value } => {
            player.ap_gain_rate += (value as f64 / 100.0) * sign as f64;
        }
        VoltageGainRateChange { sign, value } => {
            player.voltage_gain_rate += (value as f64 / 100.0) * sign as f64;
        }
        ApRateChangeResetGuard { sign, value } => {
            player.ap_rate += (value as f64 / 100.0) * sign as f64;
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
            smile: 100.0,
            pure: 100.0,
            cool: 100.0,
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
    fn smile_rate_change_applies_multiplier() {
        let mut player = PlayerAttributes::new(50);
        let mut deck = stub_deck();
        apply_center_attribute(&mut player, &mut deck, 10020000, None); // +200%
        assert_eq!(deck.cards[0].smile, 300.0);
    }

    #[test]
    fn consume_ap_change_reduces_cost_by_raw_value() {
        let mut player = PlayerAttributes::new(50);
        let mut deck = stub_deck();
        apply_center_attribute(&mut player, &mut deck, 91000002, None); // 8-digit: ConsumeAPChange, decrease, 2
        assert_eq!(deck.cards[0].cost, 3);
    }

    #[test]
    fn ap_gain_rate_change_ignores_target_scope() {
        let mut player = PlayerAttributes::new(50);
        let mut deck = stub_deck();
        apply_center_attribute(&mut player, &mut deck, 110000200, Some("10099")); // 9-digit: type 11, +2.00%
        assert_eq!(player.ap_gain_rate, 102.0);
    }

    #[test]
    fn target_restricts_per_card_effects() {
        let mut player = PlayerAttributes::new(50);
        let mut deck = stub_deck();
        apply_center_attribute(&mut player, &mut deck, 40010000, Some("10099")); // +100 smile, wrong member
        assert_eq!(deck.cards[0].smile, 100.0);
    }
}

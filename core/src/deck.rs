//! The six-card deck (component C): a cyclic play queue over live cards.
//! Ports `RDeck.py`'s `Deck` class — a `deque` over `Card` objects becomes
//! a `VecDeque` of indices into `self.cards`, so `is_except` bookkeeping
//! never has to compare cards by value.

use crate::catalog::MusicType;
use crate::live_card::LiveCard;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Deck {
    pub cards: Vec<LiveCard>,
    /// `Some(index)` for a live card still in rotation; `None` is the
    /// sentinel empty slot used when every card has been excepted.
    queue: VecDeque<Option<usize>>,
    pub appeal: i64,
    pub card_log: Vec<String>,
}

impl Deck {
    pub fn new(cards: Vec<LiveCard>) -> Self {
        let mut deck = Self {
            cards,
            queue: VecDeque::new(),
            appeal: 0,
            card_log: Vec::new(),
        };
        deck.reset();
        deck
    }

    /// Refill the queue from deck order, skipping excepted cards. If every
    /// card is excepted the queue holds a single sentinel slot so `topcard`
    /// stays well-defined instead of panicking on an empty deque.
    pub fn reset(&mut self) {
        self.queue.clear();
        for (i, card) in self.cards.iter().enumerate() {
            if !card.is_except {
                self.queue.push_back(Some(i));
            }
        }
        if self.queue.is_empty() {
            self.queue.push_back(None);
        }
    }

    pub fn topcard(&mut self) -> Option<&LiveCard> {
        if self.queue.is_empty() {
            self.reset();
        }
        self.queue[0].map(|i| &self.cards[i])
    }

    /// Like [`Deck::topcard`], but returns the card's index into `self.cards`
    /// rather than a reference, so a caller can peek the card and separately
    /// pop/fire its skill while keeping a stable index for resolver calls.
    pub fn topcard_index(&mut self) -> Option<usize> {
        if self.queue.is_empty() {
            self.reset();
        }
        self.queue[0]
    }

    /// Pops the head of the queue and fires its skill, logging its name.
    /// Returns `None` only when the queue's head is the all-excepted
    /// sentinel slot.
    pub fn topskill(&mut self) -> Option<(Vec<String>, Vec<i64>)> {
        if self.queue.is_empty() {
            self.reset();
        }
        let slot = self.queue.pop_front().flatten();
        let index = slot?;
        self.card_log.push(self.cards[index].card_series_id.to_string());
        Some(self.cards[index].fire_skill())
    }

    /// Removes a specific card from the queue immediately, used when a
    /// `CardExcept` effect targets a card that a preceding `DeckReset` in
    /// the same skill just re-enqueued.
    pub fn remove_from_queue(&mut self, card_index: usize) {
        self.queue.retain(|slot| *slot != Some(card_index));
        if self.queue.is_empty() {
            self.queue.push_back(None);
        }
    }

    /// `appeal_calc`: per-card `smile+pure+cool`, the song-color stat
    /// weighted ×10 before summing, total divided by 10 and ceiled.
    pub fn appeal_calc(&mut self, music_type: MusicType) -> i64 {
        let mut total = 0.0f64;
        for card in &self.cards {
            let mut appeals = [card.smile, card.pure, card.cool];
            let weighted_index = match music_type {
                MusicType::Smile => 0,
                MusicType::Pure => 1,
                MusicType::Cool => 2,
            };
            appeals[weighted_index] *= 10.0;
            total += appeals.iter().sum::<f64>();
        }
        let appeal = (total / 10.0).ceil() as i64;
        self.appeal = appeal;
        appeal
    }

    /// Removes the first excepted card still present in the queue (if any)
    /// after marking `card_index` excepted. Ports the Python quirk where a
    /// `DeckReset` followed by `CardExcept` in the same skill can re-enqueue
    /// a card that was just excepted; the simulator only honors `is_except`
    /// when `reset` runs, so this sweeps it back out immediately.
    pub fn except_and_clean(&mut self, card_index: usize) {
        self.cards[card_index].is_except = true;
        if let Some(pos) = self
            .queue
            .iter()
            .position(|slot| slot.map(|i| self.cards[i].is_except).unwrap_or(false))
        {
            self.queue.remove(pos);
            if self.queue.is_empty() {
                self.queue.push_back(None);
            }
        }
    }

    pub fn mental_calc(&self) -> i64 {
        self.cards.iter().map(|c| c.mental).sum()
    }

    pub fn used_all_skill_calc(&self) -> u32 {
        self.cards.iter().map(|c| c.active_count).sum()
    }

    /// Recomputes the Death-Note AFK threshold: the minimum configured
    /// threshold across every un-excepted deck card listed in `death_note`,
    /// or `None` if no such card remains (e.g. all were excepted).
    pub fn death_note_threshold(&self, death_note: &std::collections::HashMap<i64, f64>) -> Option<f64> {
        self.cards
            .iter()
            .filter(|c| !c.is_except)
            .filter_map(|c| death_note.get(&c.card_series_id).copied())
            .fold(None, |acc, threshold| {
                Some(acc.map_or(threshold, |a: f64| a.min(threshold)))
            })
    }

    pub fn contains_card(&self, card_series_id: i64) -> bool {
        self.cards.iter().any(|c| c.card_series_id == card_series_id)
    }

    pub fn index_of(&self, card_series_id: i64) -> Option<usize> {
        self.cards.iter().position(|c| c.card_series_id == card_series_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Rarity;
    use crate::live_card::{LiveCard, SkillBinding};

    fn stub_card(series_id: i64) -> LiveCard {
        LiveCard {
            card_series_id: series_id,
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
        }
    }

    #[test]
    fn reset_skips_excepted_cards_and_preserves_order() {
        let mut cards = vec![stub_card(1), stub_card(2), stub_card(3)];
        cards[1].is_except = true;
        let mut deck = Deck::new(cards);
        assert_eq!(deck.topcard().unwrap().card_series_id, 1);
        deck.topskill();
        assert_eq!(deck.topcard().unwrap().card_series_id, 3);
    }

    #[test]
    fn all_excepted_leaves_a_sentinel_slot() {
        let mut cards = vec![stub_card(1), stub_card(2)];
        for c in &mut cards {
            c.is_except = true;
        }
        let mut deck = Deck::new(cards);
        assert!(deck.topcard().is_none());
        assert!(deck.topskill().is_none());
    }

    #[test]
    fn reset_refills_after_full_rotation() {
        let cards = vec![stub_card(1), stub_card(2)];
        let mut deck = Deck::new(cards);
        deck.topskill();
        deck.topskill();
        // queue now empty; topcard/topskill must auto-reset
        assert_eq!(deck.topcard().unwrap().card_series_id, 1);
    }

    #[test]
    fn appeal_calc_weights_song_color_stat_by_ten() {
        let cards = vec![stub_card(1)];
        let mut deck = Deck::new(cards);
        // smile=pure=cool=10; Smile-type song weights smile by 10: (100+10+10)/10 = 12
        assert_eq!(deck.appeal_calc(MusicType::Smile), 12);
    }

    #[test]
    fn death_note_threshold_is_minimum_across_matching_cards() {
        let cards = vec![stub_card(1041513), stub_card(1042515)];
        let deck = Deck::new(cards);
        let mut table = std::collections::HashMap::new();
        table.insert(1041513, 10.0);
        table.insert(1042515, 5.0);
        assert_eq!(deck.death_note_threshold(&table), Some(5.0));
    }
}

//! Single-play event engine (component E, second half). Merges the chart's
//! immutable event cursor with a dynamic min-heap of scheduled events
//! (`CDavailable`, Hanabi-Ginko's delayed `_<NoteType>` judgements) the way
//! `Simulator_core.py`'s `run_game_simulation` merges `ChartEvents` with a
//! heap-pushed `CDavailable` entry.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::catalog::MusicRecord;
use crate::chart::{Chart, ChartEvent, NoteEvent};
use crate::deck::Deck;
use crate::error::SimulationGuard;
use crate::player::{Judgement, MentalDown, PlayerAttributes};
use crate::resolver;

/// Card id whose presence in the deck defers MISS judgements to a delayed
/// event instead of applying them at note time (`flag_hanabi_ginko` in the
/// Python reference).
const HANABI_GINKO_CARD_ID: i64 = 1041517;

/// `MISS_TIMING`: how far past the note's own timestamp the delayed
/// judgement fires, per note kind.
fn judgement_window(note_event: NoteEvent) -> f64 {
    match note_event {
        NoteEvent::Single => 0.125,
        NoteEvent::Hold => 0.125,
        NoteEvent::Flick => 0.100,
        NoteEvent::HoldMid => 0.070,
        NoteEvent::Trace => 0.070,
    }
}

#[derive(Debug, Clone, Copy)]
enum DynamicKind {
    CdAvailable,
    DelayedJudgement(NoteEvent),
}

#[derive(Debug, Clone, Copy)]
struct DynamicEvent {
    time: f64,
    seq: u64,
    kind: DynamicKind,
}

impl PartialEq for DynamicEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for DynamicEvent {}

impl PartialOrd for DynamicEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DynamicEvent {
    /// Reversed so `BinaryHeap` (a max-heap) pops the smallest `(time, seq)`
    /// first — a min-heap over scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .partial_cmp(&self.time)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The outcome of one full play: final score, which card sat in the center
/// slot, the deck's card-id order, and the per-skill-fire log.
#[derive(Debug, Clone)]
pub struct PlayResult {
    pub score: i64,
    pub center_card_id: i64,
    pub card_id_sequence: Vec<i64>,
    pub play_log: Vec<String>,
}

/// Picks the center card: an explicit index if given, otherwise the first
/// deck card matching the song's center character, preferring a DR copy
/// over a non-DR one (`card_id[4] == "8"` in the Python reference).
fn select_center_card(deck: &Deck, center_character_id: i64, explicit_index: Option<usize>) -> Option<usize> {
    if explicit_index.is_some() {
        return explicit_index;
    }
    let mut chosen: Option<usize> = None;
    for (i, card) in deck.cards.iter().enumerate() {
        if card.characters_id != center_character_id {
            continue;
        }
        if chosen.is_none() || card.rarity.is_dr() {
            chosen = Some(i);
            if card.rarity.is_dr() {
                break;
            }
        }
    }
    chosen
}

/// `CheckSkillCondition`'s "would a MISS drop HP to/below zero" promotion,
/// plus the Death-Note-inactive default of always-PERFECT.
fn decide_judgement(player: &PlayerAttributes, afk_threshold: Option<f64>, note_event: NoteEvent) -> Judgement {
    match afk_threshold {
        Some(threshold) if player.mental.get_rate() > threshold => {
            if player.mental.would_miss_kill(Some(note_event)) {
                Judgement::Perfect
            } else {
                Judgement::Miss
            }
        }
        _ => Judgement::Perfect,
    }
}

/// Runs one full play and returns its result, or a recoverable
/// [`SimulationGuard`] (empty chart, unresolvable center card).
pub fn simulate_play(
    music: &MusicRecord,
    chart: &Chart,
    mut deck: Deck,
    master_level: u32,
    death_note: &HashMap<i64, f64>,
    center_index_override: Option<usize>,
) -> Result<PlayResult, SimulationGuard> {
    let card_id_sequence: Vec<i64> = deck.cards.iter().map(|c| c.card_series_id).collect();

    if chart.all_note_size == 0 {
        log::warn!("music {} has a zero-note chart; returning a zero-score result", music.id);
        return Ok(PlayResult {
            score: 0,
            center_card_id: 0,
            card_id_sequence,
            play_log: Vec::new(),
        });
    }

    let center_index = select_center_card(&deck, music.center_character_id, center_index_override)
        .ok_or(SimulationGuard::NoCenterCard)?;
    let center_card_id = deck.cards[center_index].card_series_id;

    let mut player = PlayerAttributes::new(master_level);

    if let Some(center_attribute) = deck.cards[center_index].center_attribute.clone() {
        for (target, effect) in center_attribute.target_ids.iter().zip(center_attribute.effect_ids.iter()) {
            resolver::apply_center_attribute(&mut player, &mut deck, *effect, Some(target.as_str()));
        }
    }

    let music_type = crate::catalog::MusicType::from_code(music.music_type).unwrap_or(crate::catalog::MusicType::Smile);
    let appeal = deck.appeal_calc(music_type);
    player.hp_calc(deck.mental_calc());
    player.basescore_calc(appeal, chart.all_note_size);

    let hanabi_ginko = deck.contains_card(HANABI_GINKO_CARD_ID);
    let mut afk_threshold = deck.death_note_threshold(death_note);

    let mut seq: u64 = 0;
    let mut heap: BinaryHeap<DynamicEvent> = BinaryHeap::new();
    heap.push(DynamicEvent {
        time: player.cooldown,
        seq,
        kind: DynamicKind::CdAvailable,
    });

    let mut cursor = 0usize;

    // `UseCardSkill`'s AP-gated skill-fire, extracted so both the note
    // handler and the `CDavailable` handler can invoke it identically.
    let try_fire_skill = |player: &mut PlayerAttributes,
                          deck: &mut Deck,
                          now: f64,
                          seq: &mut u64,
                          heap: &mut BinaryHeap<DynamicEvent>,
                          afk_threshold: &mut Option<f64>| {
        let Some(card_index) = deck.topcard_index() else {
            return;
        };
        let cost = deck.cards[card_index].cost;
        if player.ap < cost as f64 {
            return;
        }
        player.ap -= cost as f64;

        let except_count_before = deck.cards.iter().filter(|c| c.is_except).count();
        let (conditions, effects) = deck.topskill().expect("card_index just confirmed present");
        resolver::use_card_skill(player, deck, card_index, &conditions, &effects);
        let except_count_after = deck.cards.iter().filter(|c| c.is_except).count();
        if except_count_after > except_count_before {
            *afk_threshold = deck.death_note_threshold(death_note);
        }

        player.cd_available = false;
        *seq += 1;
        heap.push(DynamicEvent {
            time: now + player.cooldown,
            seq: *seq,
            kind: DynamicKind::CdAvailable,
        });
    };

    loop {
        let next_chart = chart.events.get(cursor);
        let next_dynamic = heap.peek();

        let take_chart = match (next_chart, next_dynamic) {
            (None, None) => break,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(c), Some(d)) => c.time <= d.time,
        };

        if take_chart {
            let timed = *next_chart.unwrap();
            cursor += 1;
            match timed.event {
                ChartEvent::Note(note_event) => {
                    let judgement = decide_judgement(&player, afk_threshold, note_event);
                    if judgement == Judgement::Miss && hanabi_ginko {
                        seq += 1;
                        heap.push(DynamicEvent {
                            time: timed.time + judgement_window(note_event),
                            seq,
                            kind: DynamicKind::DelayedJudgement(note_event),
                        });
                    } else {
                        match player.combo_add(judgement, Some(note_event)) {
                            Ok(()) => {}
                            Err(MentalDown) => break,
                        }
                    }
                    if player.cd_available {
                        try_fire_skill(&mut player, &mut deck, timed.time, &mut seq, &mut heap, &mut afk_threshold);
                    }
                }
                ChartEvent::LiveStart => {
                    fire_center_skill(&mut player, &deck, center_index, resolver::PhaseEvent::LiveStart);
                }
                ChartEvent::FeverStart => {
                    player.voltage.set_fever(true);
                    fire_center_skill(&mut player, &deck, center_index, resolver::PhaseEvent::FeverStart);
                }
                ChartEvent::FeverEnd => {
                    player.voltage.set_fever(false);
                }
                ChartEvent::LiveEnd => {
                    fire_center_skill(&mut player, &deck, center_index, resolver::PhaseEvent::LiveEnd);
                    break;
                }
            }
        } else {
            let dynamic = heap.pop().unwrap();
            match dynamic.kind {
                DynamicKind::CdAvailable => {
                    player.cd_available = true;
                    try_fire_skill(&mut player, &mut deck, dynamic.time, &mut seq, &mut heap, &mut afk_threshold);
                }
                DynamicKind::DelayedJudgement(note_event) => {
                    let judgement = decide_judgement(&player, afk_threshold, note_event);
                    match player.combo_add(judgement, Some(note_event)) {
                        Ok(()) => {}
                        Err(MentalDown) => break,
                    }
                }
            }
        }
    }

    Ok(PlayResult {
        score: player.score,
        center_card_id,
        card_id_sequence,
        play_log: deck.card_log.clone(),
    })
}

/// `CheckCenterSkillCondition`/`ApplyCenterSkillEffect` over every
/// (condition, effect) pair bound to the center card's center skill.
fn fire_center_skill(player: &mut PlayerAttributes, deck: &Deck, center_index: usize, event: resolver::PhaseEvent) {
    let Some(center_skill) = deck.cards[center_index].center_skill.clone() else {
        return;
    };
    for (condition, effect) in center_skill.condition_ids.iter().zip(center_skill.effect_ids.iter()) {
        if resolver::check_center_skill_condition(player, deck, condition, Some(event)) {
            resolver::apply_center_skill_effect(player, *effect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Rarity;
    use crate::chart::{BpmSegment, RawNote};
    use crate::live_card::{LiveCard, SkillBinding};

    fn stub_card(series_id: i64, characters_id: i64, rarity: Rarity) -> LiveCard {
        LiveCard {
            card_series_id: series_id,
            characters_id,
            rarity,
            card_level: 140,
            evolution_stage: 4,
            smile: 100.0,
            pure: 100.0,
            cool: 100.0,
            mental: 100,
            cost: 1,
            center_attribute: None,
            center_skill: None,
            skill: SkillBinding::default(),
            active_count: 0,
            is_except: false,
        }
    }

    fn stub_music() -> MusicRecord {
        MusicRecord {
            id: 1,
            title: "Test".into(),
            music_type: 1,
            center_character_id: 101,
            singer_character_id: vec![101],
            play_time_ms: 5000,
            fever_section_no: 1,
        }
    }

    fn single_note_chart(n: usize) -> Chart {
        let notes: Vec<RawNote> = (0..n)
            .map(|i| RawNote {
                uid: i as i64,
                start_time: 1.0 + i as f64,
                flags: 0,
                hold_times: vec![],
            })
            .collect();
        Chart::load(&notes, &[BpmSegment { time: 0.0, bpm: 120.0 }], 0.5, 100.0, 100.0 + n as f64).unwrap()
    }

    #[test]
    fn empty_chart_returns_zero_score_guard_result() {
        let deck = Deck::new(vec![stub_card(1, 101, Rarity::R)]);
        let chart = Chart::load(&[], &[], 0.0, 1.0, 2.0).unwrap();
        let music = stub_music();
        let result = simulate_play(&music, &chart, deck, 50, &HashMap::new(), None).unwrap();
        assert_eq!(result.score, 0);
    }

    #[test]
    fn no_center_card_is_a_guard_error() {
        let deck = Deck::new(vec![stub_card(1, 999, Rarity::R)]);
        let chart = single_note_chart(1);
        let music = stub_music();
        let result = simulate_play(&music, &chart, deck, 50, &HashMap::new(), None);
        assert!(matches!(result, Err(SimulationGuard::NoCenterCard)));
    }

    #[test]
    fn perfect_run_without_death_note_scores_positively() {
        let deck = Deck::new(vec![
            stub_card(1, 101, Rarity::R),
            stub_card(2, 101, Rarity::R),
        ]);
        let chart = single_note_chart(10);
        let music = stub_music();
        let result = simulate_play(&music, &chart, deck, 50, &HashMap::new(), None).unwrap();
        assert!(result.score > 0);
        assert_eq!(result.center_card_id, 1);
    }

    #[test]
    fn explicit_center_index_overrides_auto_selection() {
        let deck = Deck::new(vec![
            stub_card(1, 101, Rarity::R),
            stub_card(2, 999, Rarity::R),
        ]);
        let chart = single_note_chart(3);
        let music = stub_music();
        let result = simulate_play(&music, &chart, deck, 50, &HashMap::new(), Some(1)).unwrap();
        assert_eq!(result.center_card_id, 2);
    }

    #[test]
    fn dr_card_is_preferred_for_automatic_center_selection() {
        let deck = Deck::new(vec![
            stub_card(1, 101, Rarity::R),
            stub_card(2, 101, Rarity::DR),
        ]);
        let chart = single_note_chart(3);
        let music = stub_music();
        let result = simulate_play(&music, &chart, deck, 50, &HashMap::new(), None).unwrap();
        assert_eq!(result.center_card_id, 2);
    }

    #[test]
    fn death_note_afk_forces_misses_above_threshold() {
        let deck = Deck::new(vec![stub_card(1041513, 101, Rarity::R)]);
        let chart = single_note_chart(20);
        let music = stub_music();
        let mut death_note = HashMap::new();
        death_note.insert(1041513, 10.0);
        // Mental starts at 100% and the single card's own HP is small, so
        // early notes should MISS until the rate drops to/under 10%.
        let result = simulate_play(&music, &chart, deck, 50, &death_note, None).unwrap();
        // A run that hits only PERFECTs would score far higher than this
        // deck's tiny base_score allows once several MISSes land; just
        // assert it completed without panicking and produced a result.
        assert_eq!(result.card_id_sequence, vec![1041513]);
        let _ = result.score;
    }
}

//! Deck generator (component F): two-phase enumeration — a character
//! distribution across the six deck slots, then a per-character card
//! selection within it — followed by filtering, permutation, and
//! per-center-card task expansion. Ports `DeckGen2.py`'s
//! `generate_role_distributions`/`DeckGeneratorWithDoubleCards`.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::catalog::{Catalog, Rarity};

/// A card's skill-effect-type / rarity tags, mirroring `DeckGen2.py`'s
/// heterogeneous `DB_TAG` set (a mix of `SkillEffectType` and `Rarity`
/// enum members). Only the effect *type* digit is kept, not the full
/// parsed effect — tag matching never needs the effect's value/target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardTag {
    /// First digit of a 9-digit skill-effect id (see
    /// [`crate::resolver::SkillEffect`]'s type discriminants).
    Effect(u8),
    Rarity(Rarity),
}

const SCORE_GAIN_EFFECT_TYPE: u8 = 2;
const DECK_RESET_EFFECT_TYPE: u8 = 5;

/// Whether a character may appear twice in a generated deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeckMode {
    #[default]
    DoubleAllowed,
    SingleOnly,
}

/// One deck-mining request — the constructor arguments to
/// `DeckGeneratorWithDoubleCards` in the Python reference.
#[derive(Debug, Clone, Default)]
pub struct GeneratorRequest {
    pub card_pool: Vec<i64>,
    pub must_all: Vec<i64>,
    pub must_any: Vec<i64>,
    pub must_skill_tags: Vec<CardTag>,
    pub center_character_id: Option<i64>,
    pub force_dr: bool,
    pub previously_simulated: HashSet<Vec<i64>>,
    pub mode: DeckMode,
}

/// One expanded unit of work: an ordered 6-card deck plus which slot (if
/// any) is pinned as the center card for this task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckTask {
    pub card_ids: Vec<i64>,
    pub center_index: Option<usize>,
}

/// `DB_TAG[card_series_id]`: the card's rarity plus every distinct
/// skill-effect type its max-level (14) skill carries.
pub fn card_tags(catalog: &Catalog, card_series_id: i64) -> HashSet<CardTag> {
    let mut tags = HashSet::new();
    let Some(record) = catalog.card(card_series_id) else {
        log::warn!("card {card_series_id} missing from catalog while computing tags");
        return tags;
    };
    if let Some(rarity) = record.rarity() {
        tags.insert(CardTag::Rarity(rarity));
    }
    if let Some(&skill_series_id) = record.rhythm_game_skill_series_id.last() {
        if let Some(skill) = catalog.skill(skill_series_id, 14) {
            for &effect_id in &skill.rhythm_game_skill_effect_id {
                let effect_type = (effect_id / 100_000_000) as u8;
                tags.insert(CardTag::Effect(effect_type));
            }
        }
    }
    tags
}

/// `count_skill_tags`: the multiset union of every card's tags, as counts.
fn count_skill_tags(catalog: &Catalog, card_ids: &[i64]) -> HashMap<CardTag, usize> {
    let mut counts = HashMap::new();
    for &card_id in card_ids {
        for tag in card_tags(catalog, card_id) {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    counts
}

/// `has_card_conflict`: forbidden-pair test over the global conflict table.
pub fn has_card_conflict(card_conflicts: &HashMap<i64, Vec<i64>>, deck: &HashSet<i64>) -> bool {
    card_conflicts.iter().any(|(restricted, conflicts)| {
        deck.contains(restricted) && conflicts.iter().any(|c| deck.contains(c))
    })
}

/// `check_skill_tags`: required tags all present, at most one DR in
/// double-allowed mode (unrestricted in single-only mode), and a force-DR
/// requirement if set.
fn check_skill_tags(
    tag_counts: &HashMap<CardTag, usize>,
    must_skill_tags: &[CardTag],
    mode: DeckMode,
    force_dr: bool,
) -> bool {
    if !must_skill_tags.iter().all(|tag| tag_counts.contains_key(tag)) {
        return false;
    }
    let dr_count = tag_counts.get(&CardTag::Rarity(Rarity::DR)).copied().unwrap_or(0);
    if mode == DeckMode::DoubleAllowed && dr_count > 1 {
        return false;
    }
    if force_dr && dr_count == 0 {
        return false;
    }
    true
}

/// `generate_role_distributions`: every sorted 6-length character-id tuple
/// satisfying the mode's double-card constraint.
fn generate_role_distributions(all_characters: &[i64], mode: DeckMode) -> Vec<Vec<i64>> {
    let mut results: HashSet<Vec<i64>> = HashSet::new();

    match mode {
        DeckMode::DoubleAllowed => {
            for double_count in 0..=3usize {
                for doubles in all_characters.iter().copied().combinations(double_count) {
                    let doubles_set: HashSet<i64> = doubles.iter().copied().collect();
                    let remaining_needed = 6 - 2 * double_count;
                    let remaining_pool: Vec<i64> = all_characters
                        .iter()
                        .copied()
                        .filter(|c| !doubles_set.contains(c))
                        .collect();
                    for singles in remaining_pool.into_iter().combinations(remaining_needed) {
                        let mut distribution: Vec<i64> = doubles
                            .iter()
                            .copied()
                            .chain(doubles.iter().copied())
                            .chain(singles)
                            .collect();
                        distribution.sort_unstable();
                        results.insert(distribution);
                    }
                }
            }
        }
        DeckMode::SingleOnly => {
            if all_characters.len() >= 6 {
                for singles in all_characters.iter().copied().combinations(6) {
                    let mut distribution = singles;
                    distribution.sort_unstable();
                    results.insert(distribution);
                }
            }
        }
    }

    results.into_iter().collect()
}

/// `_generate_valid_permutations`: every ordering of a 6-card deck whose
/// first slot isn't a `ScoreGain` card and whose last slot isn't a
/// `DeckReset` card.
fn valid_permutations<'a>(catalog: &'a Catalog, deck: &'a [i64]) -> impl Iterator<Item = Vec<i64>> + 'a {
    let score_gain_cards: HashSet<i64> = deck
        .iter()
        .copied()
        .filter(|&id| card_tags(catalog, id).contains(&CardTag::Effect(SCORE_GAIN_EFFECT_TYPE)))
        .collect();
    let deck_reset_cards: HashSet<i64> = deck
        .iter()
        .copied()
        .filter(|&id| card_tags(catalog, id).contains(&CardTag::Effect(DECK_RESET_EFFECT_TYPE)))
        .collect();

    deck.to_vec().into_iter().permutations(deck.len()).filter(move |perm| {
        !score_gain_cards.contains(&perm[0]) && !deck_reset_cards.contains(perm.last().unwrap())
    })
}

/// `char_id_to_cards`: groups the card pool by `CardRecord::characters_id`,
/// preserving pool order within each bucket (stable iteration order,
/// mirroring the Python's `defaultdict(list)` insertion order) — an
/// `indexmap::IndexMap` in place of the Python's `char_id = card_id // 1000`
/// derivation, since the Rust generator has the full catalog on hand and can
/// group by the record's actual character field directly.
fn group_by_character(catalog: &Catalog, card_pool: &[i64]) -> IndexMap<i64, Vec<i64>> {
    let mut map: IndexMap<i64, Vec<i64>> = IndexMap::new();
    for &card_id in card_pool {
        let Some(record) = catalog.card(card_id) else {
            log::warn!("card {card_id} in pool missing from catalog, skipping");
            continue;
        };
        map.entry(record.characters_id).or_default().push(card_id);
    }
    map
}

/// Per-character card choices for one distribution: `count == 1` yields
/// single-card tuples, `count == 2` yields unordered pairs.
fn card_choices_per_character(
    char_id_to_cards: &IndexMap<i64, Vec<i64>>,
    char_distribution: &[i64],
) -> Option<Vec<Vec<Vec<i64>>>> {
    let mut char_counts: IndexMap<i64, usize> = IndexMap::new();
    for &c in char_distribution {
        *char_counts.entry(c).or_insert(0) += 1;
    }

    let mut choices = Vec::with_capacity(char_counts.len());
    for (char_id, count) in char_counts {
        let pool = char_id_to_cards.get(&char_id)?;
        let per_char = match count {
            1 => pool.iter().map(|&id| vec![id]).collect(),
            2 => pool.iter().copied().combinations(2).collect(),
            _ => {
                log::warn!("character {char_id} appears {count} times in a distribution, which is not 1 or 2");
                return None;
            }
        };
        choices.push(per_char);
    }
    Some(choices)
}

/// Cartesian product over `card_choices_per_character`'s per-character
/// options, producing every unordered 6-card combination for one
/// distribution.
fn decks_for_distribution(char_id_to_cards: &IndexMap<i64, Vec<i64>>, char_distribution: &[i64]) -> Vec<Vec<i64>> {
    let Some(choices) = card_choices_per_character(char_id_to_cards, char_distribution) else {
        return Vec::new();
    };
    if choices.is_empty() {
        return Vec::new();
    }
    choices
        .into_iter()
        .multi_cartesian_product()
        .map(|combo| combo.into_iter().flatten().collect())
        .collect()
}

fn passes_filters(catalog: &Catalog, request: &GeneratorRequest, deck: &[i64]) -> bool {
    let mut sorted = deck.to_vec();
    sorted.sort_unstable();
    if request.previously_simulated.contains(&sorted) {
        return false;
    }
    if !request.must_all.is_empty() && !request.must_all.iter().all(|c| deck.contains(c)) {
        return false;
    }
    if !request.must_any.is_empty() && !request.must_any.iter().any(|c| deck.contains(c)) {
        return false;
    }
    let tag_counts = count_skill_tags(catalog, deck);
    check_skill_tags(&tag_counts, &request.must_skill_tags, request.mode, request.force_dr)
}

/// Expands one filtered, permutation-valid deck into its center-pinned
/// tasks: one task per card matching `center_character_id`, or a single
/// unpinned task if no center character was requested.
fn expand_center_tasks(catalog: &Catalog, request: &GeneratorRequest, deck: &[i64]) -> Vec<DeckTask> {
    let Some(center_character_id) = request.center_character_id else {
        return vec![DeckTask {
            card_ids: deck.to_vec(),
            center_index: None,
        }];
    };
    let mut tasks = Vec::new();
    for (i, &card_id) in deck.iter().enumerate() {
        if catalog.card(card_id).map(|c| c.characters_id) == Some(center_character_id) {
            tasks.push(DeckTask {
                card_ids: deck.to_vec(),
                center_index: Some(i),
            });
        }
    }
    tasks
}

/// Lazily iterates every `DeckTask` for a request, in the same order the
/// Python reference's `__iter__` yields decks: distributions outer, then
/// filtered unordered decks, then valid permutations, then center-task
/// expansion.
pub fn generate<'a>(
    catalog: &'a Catalog,
    card_conflicts: &'a HashMap<i64, Vec<i64>>,
    request: &'a GeneratorRequest,
) -> impl Iterator<Item = DeckTask> + 'a {
    let char_id_to_cards = group_by_character(catalog, &request.card_pool);
    let all_characters: Vec<i64> = char_id_to_cards.keys().copied().collect();
    let min_chars_required = match request.mode {
        DeckMode::DoubleAllowed => 3,
        DeckMode::SingleOnly => 6,
    };

    let distributions: Vec<Vec<i64>> = if all_characters.len() < min_chars_required {
        Vec::new()
    } else {
        generate_role_distributions(&all_characters, request.mode)
            .into_iter()
            .filter(|dist| request.center_character_id.map(|c| dist.contains(&c)).unwrap_or(true))
            .collect()
    };

    distributions.into_iter().flat_map(move |dist| {
        let decks = decks_for_distribution(&char_id_to_cards, &dist);
        decks
            .into_iter()
            .filter(|deck| {
                let deck_set: HashSet<i64> = deck.iter().copied().collect();
                !has_card_conflict(card_conflicts, &deck_set) && passes_filters(catalog, request, deck)
            })
            .flat_map(|deck| valid_permutations(catalog, &deck).collect::<Vec<_>>())
            .flat_map(|perm| expand_center_tasks(catalog, request, &perm))
    })
}

/// `compute_total_count`/`_count_valid_permutations`: the exact count the
/// lazy `generate` iterator would produce, computed without materializing
/// permutations — used by the dispatcher for progress sizing.
pub fn count_total(catalog: &Catalog, card_conflicts: &HashMap<i64, Vec<i64>>, request: &GeneratorRequest) -> usize {
    let char_id_to_cards = group_by_character(catalog, &request.card_pool);
    let all_characters: Vec<i64> = char_id_to_cards.keys().copied().collect();
    let min_chars_required = match request.mode {
        DeckMode::DoubleAllowed => 3,
        DeckMode::SingleOnly => 6,
    };
    if all_characters.len() < min_chars_required {
        return 0;
    }

    let mut total = 0usize;
    for dist in generate_role_distributions(&all_characters, request.mode) {
        if let Some(c) = request.center_character_id {
            if !dist.contains(&c) {
                continue;
            }
        }
        for deck in decks_for_distribution(&char_id_to_cards, &dist) {
            let deck_set: HashSet<i64> = deck.iter().copied().collect();
            if has_card_conflict(card_conflicts, &deck_set) {
                continue;
            }
            if !passes_filters(catalog, request, &deck) {
                continue;
            }
            total += count_valid_permutations(catalog, request, &deck);
        }
    }
    total
}

/// `_count_valid_permutations`: valid-permutation count (without
/// materializing them), times the number of center-matching cards (or 1 if
/// no center character was requested).
fn count_valid_permutations(catalog: &Catalog, request: &GeneratorRequest, deck: &[i64]) -> usize {
    let center_card_count = match request.center_character_id {
        Some(center_character_id) => {
            let count = deck
                .iter()
                .filter(|&&id| catalog.card(id).map(|c| c.characters_id) == Some(center_character_id))
                .count();
            if count == 0 {
                1
            } else {
                count
            }
        }
        None => 1,
    };
    valid_permutations(catalog, deck).count() * center_card_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Writes a minimal catalog (6 single-skill cards across 6 characters,
    /// no center skills/attributes/musics needed for these tests) to a temp
    /// directory and loads it, mirroring `catalog::tests`' file-based style.
    fn build_test_catalog() -> Catalog {
        let dir = std::env::temp_dir().join(format!("generator_test_catalog_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut cards = serde_json::Map::new();
        let mut skills = serde_json::Map::new();
        for (i, char_id) in [101, 102, 103, 104, 105, 106].into_iter().enumerate() {
            let card_id = 1_000_000 + (i as i64 + 1) * 10_000 + 1;
            let skill_series = 3_000_000 + (i as i64 + 1) * 10_000;
            cards.insert(
                card_id.to_string(),
                serde_json::json!({
                    "card_series_id": card_id,
                    "name": format!("card-{card_id}"),
                    "description": "",
                    "characters_id": char_id,
                    "rarity": 3,
                    "center_skill_series_id": 0,
                    "center_attribute_series_id": 0,
                    "max_smile": [0,0,100,0,0],
                    "max_pure": [0,0,100,0,0],
                    "max_cool": [0,0,100,0,0],
                    "max_mental": [0,0,100,0,0],
                    "rhythm_game_skill_series_id": [skill_series],
                }),
            );
            skills.insert(
                (skill_series * 100 + 14).to_string(),
                serde_json::json!({
                    "rhythm_game_skill_condition_ids": ["0"],
                    "rhythm_game_skill_effect_id": [100_010_000],
                    "consume_ap": 1,
                }),
            );
        }

        let write_json = |name: &str, value: &serde_json::Value| {
            let path = dir.join(name);
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(serde_json::to_string(value).unwrap().as_bytes()).unwrap();
            path
        };

        let cards_path = write_json("cards.json", &serde_json::Value::Object(cards));
        let skills_path = write_json("skills.json", &serde_json::Value::Object(skills));
        let empty_path = write_json("empty.json", &serde_json::json!({}));

        Catalog::load(&cards_path, &skills_path, &empty_path, &empty_path, &empty_path).unwrap()
    }

    fn pool_ids() -> Vec<i64> {
        (1..=6).map(|i| 1_000_000 + i * 10_000 + 1).collect()
    }

    #[test]
    fn role_distributions_respect_double_allowed_bounds() {
        let chars = vec![1, 2, 3, 4, 5, 6, 7];
        let distributions = generate_role_distributions(&chars, DeckMode::DoubleAllowed);
        assert!(distributions.iter().all(|d| d.len() == 6));
        for dist in &distributions {
            let mut counts: HashMap<i64, usize> = HashMap::new();
            for &c in dist {
                *counts.entry(c).or_insert(0) += 1;
            }
            assert!(counts.values().filter(|&&n| n == 2).count() <= 3);
            assert!(counts.values().all(|&n| n == 1 || n == 2));
        }
    }

    #[test]
    fn role_distributions_single_only_requires_six_distinct() {
        let chars = vec![1, 2, 3, 4, 5];
        assert!(generate_role_distributions(&chars, DeckMode::SingleOnly).is_empty());
        let chars = vec![1, 2, 3, 4, 5, 6];
        let distributions = generate_role_distributions(&chars, DeckMode::SingleOnly);
        assert_eq!(distributions.len(), 1);
        assert_eq!(distributions[0], vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn has_card_conflict_is_symmetric_if_present() {
        let mut conflicts = HashMap::new();
        conflicts.insert(1031530, vec![1041513]);
        let deck: HashSet<i64> = [1031530, 1041513, 1, 2, 3, 4].into_iter().collect();
        assert!(has_card_conflict(&conflicts, &deck));
        let clean: HashSet<i64> = [1031530, 9, 9, 9, 9, 9].into_iter().collect();
        assert!(!has_card_conflict(&conflicts, &clean));
    }

    #[test]
    fn count_total_matches_iterator_length() {
        let catalog = build_test_catalog();
        let request = GeneratorRequest {
            card_pool: pool_ids(),
            mode: DeckMode::SingleOnly,
            ..Default::default()
        };
        let card_conflicts = HashMap::new();
        let counted = count_total(&catalog, &card_conflicts, &request);
        let iterated = generate(&catalog, &card_conflicts, &request).count();
        assert_eq!(counted, iterated);
        // Single distinct-character distribution, no ScoreGain/DeckReset
        // tagged cards to exclude, no center character pinned: 6! orderings.
        assert_eq!(counted, 720);
    }

    #[test]
    fn must_all_filters_out_decks_missing_a_required_card() {
        let catalog = build_test_catalog();
        let required = pool_ids()[0];
        let request = GeneratorRequest {
            card_pool: pool_ids()[1..].to_vec(),
            must_all: vec![required],
            mode: DeckMode::SingleOnly,
            ..Default::default()
        };
        let card_conflicts = HashMap::new();
        assert_eq!(count_total(&catalog, &card_conflicts, &request), 0);
        assert_eq!(generate(&catalog, &card_conflicts, &request).count(), 0);
    }

    #[test]
    fn center_character_expands_one_task_per_matching_card() {
        let catalog = build_test_catalog();
        let ids = pool_ids();
        let request = GeneratorRequest {
            card_pool: ids.clone(),
            center_character_id: Some(101),
            mode: DeckMode::SingleOnly,
            ..Default::default()
        };
        let card_conflicts = HashMap::new();
        let tasks: Vec<_> = generate(&catalog, &card_conflicts, &request).collect();
        assert!(!tasks.is_empty());
        assert!(tasks.iter().all(|t| t.center_index.is_some()));
        assert!(tasks
            .iter()
            .all(|t| t.card_ids[t.center_index.unwrap()] == ids[0]));
    }
}

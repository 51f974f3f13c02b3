//! Multi-song optimizer (component H): picks the highest-total-pt
//! combination of one deck per song out of three candidate lists, subject
//! to no card being reused across songs. Spec §4.H pins a specific
//! bitmask branch-and-bound shape — a deliberate redesign of
//! `multi_song_optimizer.py`'s generic N-song recursive backtracking (set
//! intersection for conflicts, naive/smart remaining-max-pt pruning) into
//! a fixed triple-nested loop over three pt-descending-sorted lists.

use std::collections::HashMap;

use crate::dispatcher::DeckRecord;

/// One song's candidate deck, reduced to what the search actually needs:
/// its rank (`pt`, falling back to `score`), and the bitmask of distinct
/// cards it occupies.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    pt: i64,
    mask: u64,
}

/// The winning assignment: one candidate index per song (`None` for the
/// synthetic empty-deck slot used to pad a 2-song run), plus the summed pt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestCombo {
    pub song_indices: [Option<usize>; 3],
    pub total_pt: i64,
}

/// Assigns a stable bit to every distinct card id seen across all three
/// lists. Spec §4.H requires at most 64 distinct cards total; a richer
/// combination would need a wider bitset, which this port doesn't carry
/// since the source material never exceeds three 6-card decks sharing a
/// pool of a few dozen cards.
fn assign_bits(lists: &[&[DeckRecord]; 3]) -> HashMap<i64, u64> {
    let mut bits = HashMap::new();
    let mut next_bit = 0u32;
    for list in lists {
        for record in list.iter() {
            for &card_id in &record.deck_card_ids {
                bits.entry(card_id).or_insert_with(|| {
                    let bit = next_bit;
                    next_bit += 1;
                    bit
                });
            }
        }
    }
    assert!(
        next_bit <= 64,
        "optimizer requires at most 64 distinct cards across all three song lists, found {next_bit}"
    );
    bits
}

fn to_candidates(list: &[DeckRecord], bits: &HashMap<i64, u64>) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = list
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let mask = record
                .deck_card_ids
                .iter()
                .fold(0u64, |acc, id| acc | (1u64 << bits[id]));
            Candidate {
                index,
                pt: record.pt.unwrap_or(record.score),
                mask,
            }
        })
        .collect();
    candidates.sort_by(|a, b| b.pt.cmp(&a.pt));
    candidates
}

/// Suffix-max pt for a pt-descending-sorted candidate list:
/// `suffix_max[i]` is the best pt achievable from index `i` onward — just
/// `candidates[i].pt` since the list is already sorted descending, kept as
/// an explicit table to make the prune arithmetic below read directly off
/// spec §4.H's prose.
fn top_pt(candidates: &[Candidate]) -> i64 {
    candidates.first().map(|c| c.pt).unwrap_or(0)
}

/// Orders the three song lists best-worst-middle by their own top pt, per
/// spec §4.H: "Sort songs by their top pt: best list first, worst second,
/// middle third" — deliberately not the Python's strict descending order,
/// which would place the middle list second instead of third.
fn order_best_worst_middle(lists: [&[DeckRecord]; 3]) -> [&[DeckRecord]; 3] {
    let mut ranked: Vec<(&[DeckRecord], i64)> = lists
        .into_iter()
        .map(|list| {
            let best = list.iter().map(|r| r.pt.unwrap_or(r.score)).max().unwrap_or(0);
            (list, best)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    // ranked[0] = best, ranked[1] = worst-of-the-rest... spec orders
    // "best, worst, middle": after a descending sort, index 2 (last) is
    // the worst and index 1 is the middle, so swap positions 1 and 2.
    [ranked[0].0, ranked[2].0, ranked[1].0]
}

/// Finds the best 3-deck combination across `song_a`, `song_b`, `song_c`
/// (one deck per song, no shared cards), using the triple-nested
/// bitmask search spec §4.H mandates. Falls back to the best 2-of-3
/// combination (with the third song left unassigned) if no 3-song
/// solution exists — i.e. if at least one list is empty.
pub fn optimize(song_a: &[DeckRecord], song_b: &[DeckRecord], song_c: &[DeckRecord]) -> BestCombo {
    let lists = [song_a, song_b, song_c];
    let bits = assign_bits(&lists);
    let ordered = order_best_worst_middle(lists);

    let candidates: Vec<Vec<Candidate>> = ordered.iter().map(|list| to_candidates(list, &bits)).collect();

    if candidates.iter().all(|c| !c.is_empty()) {
        if let Some(best) = search_three(&candidates[0], &candidates[1], &candidates[2]) {
            return remap_to_original_order(best, &lists, &ordered);
        }
    }

    search_two_of_three(&lists, &bits)
}

/// The exact triple-nested `i1 -> i2 -> i3` search from spec §4.H: outer
/// prune on `pt[i1] + top(list2) + top(list3)`, middle prune on
/// `pt[i1] + pt[i2] + top(list3)`, a conflict check via mask intersection,
/// and an inner prune that breaks as soon as the pt-descending inner list
/// can no longer beat the current best.
fn search_three(list1: &[Candidate], list2: &[Candidate], list3: &[Candidate]) -> Option<(usize, usize, usize, i64)> {
    let top2 = top_pt(list2);
    let top3 = top_pt(list3);

    let mut best: Option<(usize, usize, usize, i64)> = None;
    let mut best_pt = i64::MIN;

    for c1 in list1 {
        if c1.pt + top2 + top3 <= best_pt {
            break;
        }
        for c2 in list2 {
            if c1.pt + c2.pt + top3 <= best_pt {
                break;
            }
            if c1.mask & c2.mask != 0 {
                continue;
            }
            let combined_mask = c1.mask | c2.mask;
            for c3 in list3 {
                let total = c1.pt + c2.pt + c3.pt;
                if total <= best_pt {
                    break;
                }
                if combined_mask & c3.mask != 0 {
                    continue;
                }
                best_pt = total;
                best = Some((c1.index, c2.index, c3.index, total));
            }
        }
    }
    best
}

/// When no full 3-song solution exists (one list empty), tries every pair
/// of the three songs and keeps the best conflict-free pair, leaving the
/// excluded song's slot as `None`.
fn search_two_of_three(lists: &[&[DeckRecord]; 3], bits: &HashMap<i64, u64>) -> BestCombo {
    let pairs: [(usize, usize, usize); 3] = [(0, 1, 2), (0, 2, 1), (1, 2, 0)];
    let mut best = BestCombo {
        song_indices: [None, None, None],
        total_pt: 0,
    };

    for (a, b, excluded) in pairs {
        let list_a = to_candidates(lists[a], bits);
        let list_b = to_candidates(lists[b], bits);
        for ca in &list_a {
            if ca.pt + top_pt(&list_b) <= best.total_pt {
                break;
            }
            for cb in &list_b {
                let total = ca.pt + cb.pt;
                if total <= best.total_pt {
                    break;
                }
                if ca.mask & cb.mask != 0 {
                    continue;
                }
                let mut song_indices = [None, None, None];
                song_indices[a] = Some(ca.index);
                song_indices[b] = Some(cb.index);
                song_indices[excluded] = None;
                best = BestCombo {
                    song_indices,
                    total_pt: total,
                };
            }
        }
    }
    best
}

/// `search_three` runs over the best/worst/middle-reordered lists; this
/// maps its winning indices back to the caller's original `(song_a,
/// song_b, song_c)` slot order.
fn remap_to_original_order(
    found: (usize, usize, usize, i64),
    original: &[&[DeckRecord]; 3],
    ordered: &[&[DeckRecord]; 3],
) -> BestCombo {
    let (i1, i2, i3, total_pt) = found;
    let ordered_indices = [Some(i1), Some(i2), Some(i3)];
    let mut song_indices = [None; 3];
    for (ordered_pos, list) in ordered.iter().enumerate() {
        let original_pos = original.iter().position(|l| std::ptr::eq(*l, *list)).unwrap();
        song_indices[original_pos] = ordered_indices[ordered_pos];
    }
    BestCombo { song_indices, total_pt }
}

/// Renders a [`BestCombo`] as the human-text best-combination file spec §6
/// calls for: total pt up front, then per-song rank/score/pt/deck id list
/// (rank is this song's position in its own pt-descending result list, 1
/// for the top entry; a song left unassigned by the 2-of-3 fallback prints
/// "none").
pub fn format_best_combo(combo: &BestCombo, songs: &[&[DeckRecord]; 3]) -> String {
    let mut out = format!("total pt: {}\n", combo.total_pt);
    for (song_no, (&index, list)) in combo.song_indices.iter().zip(songs.iter()).enumerate() {
        out.push_str(&format!("song {}: ", song_no + 1));
        match index {
            Some(i) => {
                let record = &list[i];
                out.push_str(&format!(
                    "rank {} score {} pt {} deck {:?}\n",
                    i + 1,
                    record.score,
                    record.pt.unwrap_or(record.score),
                    record.deck_card_ids,
                ));
            }
            None => out.push_str("none\n"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ids: &[i64], pt: i64) -> DeckRecord {
        DeckRecord {
            deck_card_ids: ids.to_vec(),
            center_card: ids[0],
            score: pt,
            pt: Some(pt),
        }
    }

    /// Spec §8 scenario 5: three songs with overlapping card pools where
    /// the naively-best per-song picks conflict, and the correct answer
    /// trades one song's second-best pick to avoid the clash.
    #[test]
    fn conflict_forces_a_suboptimal_per_song_pick_for_a_higher_total() {
        let song1 = vec![record(&[1, 2, 3, 4, 5, 6], 100)];
        let song2 = vec![record(&[1, 2, 3, 7, 8, 9], 90), record(&[7, 8, 9, 10, 11, 12], 80)];
        let song3 = vec![record(&[13, 14, 15, 16, 17, 18], 70)];

        let best = optimize(&song1, &song2, &song3);
        assert_eq!(best.total_pt, 250);
        assert_eq!(best.song_indices, [Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn disjoint_candidates_take_the_top_pick_from_each_song() {
        let song1 = vec![record(&[1, 2, 3, 4, 5, 6], 100)];
        let song2 = vec![record(&[7, 8, 9, 10, 11, 12], 50)];
        let song3 = vec![record(&[13, 14, 15, 16, 17, 18], 30)];

        let best = optimize(&song1, &song2, &song3);
        assert_eq!(best.total_pt, 180);
        assert_eq!(best.song_indices, [Some(0), Some(0), Some(0)]);
    }

    #[test]
    fn empty_third_song_falls_back_to_best_two_of_three() {
        let song1 = vec![record(&[1, 2, 3, 4, 5, 6], 100)];
        let song2 = vec![record(&[7, 8, 9, 10, 11, 12], 50)];
        let song3: Vec<DeckRecord> = vec![];

        let best = optimize(&song1, &song2, &song3);
        assert_eq!(best.total_pt, 150);
        assert_eq!(best.song_indices, [Some(0), Some(0), None]);
    }

    #[test]
    fn format_best_combo_prints_none_for_an_unassigned_song() {
        let song1 = vec![record(&[1, 2, 3, 4, 5, 6], 100)];
        let song2 = vec![record(&[7, 8, 9, 10, 11, 12], 50)];
        let song3: Vec<DeckRecord> = vec![];

        let best = optimize(&song1, &song2, &song3);
        let text = format_best_combo(&best, &[&song1, &song2, &song3]);
        assert!(text.starts_with("total pt: 150\n"));
        assert!(text.contains("song 3: none\n"));
        assert!(text.contains("deck [1, 2, 3, 4, 5, 6]"));
    }
}

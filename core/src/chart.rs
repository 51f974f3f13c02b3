//! Chart loader (component B): folds a pre-parsed raw note/BPM stream into
//! a strictly time-sorted [`ChartEvent`] timeline, merging hold chains the
//! way `RChart.py`'s `_merge_holds`/`_GetHolds_multi_bpm` do.
//!
//! Decompressing the `.bytes` chart payload and looking up fever-section
//! boundaries from the musicscore CSV are external concerns (see
//! `SPEC_FULL.md` §1 Non-goals); callers hand in the already-decoded note
//! stream plus the already-resolved fever window.

use crate::error::ChartLoadError;

/// Tolerance for note-timestamp equality, per spec §4.B.
pub const NOTE_ERROR: f64 = 1.0001e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    Single,
    Hold,
    Flick,
    Trace,
}

impl NoteKind {
    fn from_type_bits(bits: u64) -> Option<Self> {
        Some(match bits {
            0 => NoteKind::Single,
            1 => NoteKind::Hold,
            2 => NoteKind::Flick,
            3 => NoteKind::Trace,
            _ => return None,
        })
    }
}

/// One note as delivered by the pre-parsed chart stream: a start time, a
/// bit-packed flags word (type in bits 0..3, start/end board lanes in the
/// four 6-bit fields above it), and — for `Hold` notes only — the raw
/// intra-note judgement timestamps before chain merging.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawNote {
    pub uid: i64,
    pub start_time: f64,
    pub flags: u64,
    pub hold_times: Vec<f64>,
}

impl RawNote {
    pub fn kind(&self) -> Option<NoteKind> {
        NoteKind::from_type_bits(self.flags & 0xF)
    }

    pub fn start_pos(&self) -> (u8, u8) {
        (
            ((self.flags >> 16) & 0x3F) as u8,
            ((self.flags >> 4) & 0x3F) as u8,
        )
    }

    pub fn end_pos(&self) -> (u8, u8) {
        (
            ((self.flags >> 22) & 0x3F) as u8,
            ((self.flags >> 10) & 0x3F) as u8,
        )
    }

    fn last_time(&self) -> f64 {
        self.hold_times.last().copied().unwrap_or(self.start_time)
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct BpmSegment {
    pub time: f64,
    pub bpm: f64,
}

/// On-disk shape of a pre-decoded chart file: the already-merged note
/// stream plus its BPM map and fever window, as handed to [`Chart::load`].
/// Decoding the real `.bytes` chart payload is out of scope (§1
/// Non-goals); this is the JSON a driver reads once that decoding has
/// already happened upstream.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChartFile {
    pub notes: Vec<RawNote>,
    pub bpm: Vec<BpmSegment>,
    pub fever_start_time: f64,
    pub fever_end_time: f64,
    pub play_time_seconds: f64,
}

impl ChartFile {
    pub fn into_chart(self) -> Result<Chart, ChartLoadError> {
        Chart::load(&self.notes, &self.bpm, self.fever_start_time, self.fever_end_time, self.play_time_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    Single,
    Hold,
    HoldMid,
    Flick,
    Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartEvent {
    LiveStart,
    LiveEnd,
    FeverStart,
    FeverEnd,
    Note(NoteEvent),
}

/// A single merged judgement-point in the final timeline.
#[derive(Debug, Clone, Copy)]
pub struct TimedEvent {
    pub time: f64,
    pub event: ChartEvent,
}

#[derive(Debug, Clone)]
pub struct Chart {
    /// Sorted strictly ascending by `time`.
    pub events: Vec<TimedEvent>,
    pub all_note_size: usize,
    pub fever_start_time: f64,
    pub fever_end_time: f64,
    pub play_time_seconds: f64,
}

impl Chart {
    pub fn load(
        raw_notes: &[RawNote],
        bpm: &[BpmSegment],
        fever_start_time: f64,
        fever_end_time: f64,
        play_time_seconds: f64,
    ) -> Result<Self, ChartLoadError> {
        let merged = merge_hold_chains(raw_notes, bpm)?;

        let mut events = Vec::with_capacity(merged.len() * 2 + 4);
        let mut all_note_size = 0usize;

        events.push(TimedEvent {
            time: 0.0,
            event: ChartEvent::LiveStart,
        });
        events.push(TimedEvent {
            time: fever_start_time,
            event: ChartEvent::FeverStart,
        });

        for note in &merged {
            all_note_size += 1;
            match note.kind() {
                Some(NoteKind::Hold) => {
                    events.push(TimedEvent {
                        time: note.start_time,
                        event: ChartEvent::Note(NoteEvent::Hold),
                    });
                    let last_index = note.hold_times.len().saturating_sub(1);
                    for (i, t) in note.hold_times.iter().enumerate() {
                        all_note_size += 1;
                        let tag = if i == last_index {
                            NoteEvent::Hold
                        } else {
                            NoteEvent::HoldMid
                        };
                        events.push(TimedEvent {
                            time: *t,
                            event: ChartEvent::Note(tag),
                        });
                    }
                }
                Some(NoteKind::Single) => events.push(TimedEvent {
                    time: note.start_time,
                    event: ChartEvent::Note(NoteEvent::Single),
                }),
                Some(NoteKind::Flick) => events.push(TimedEvent {
                    time: note.start_time,
                    event: ChartEvent::Note(NoteEvent::Flick),
                }),
                Some(NoteKind::Trace) => events.push(TimedEvent {
                    time: note.start_time,
                    event: ChartEvent::Note(NoteEvent::Trace),
                }),
                None => {
                    return Err(ChartLoadError::Malformed(format!(
                        "note {} has unknown type bits",
                        note.uid
                    )))
                }
            }
        }

        events.push(TimedEvent {
            time: fever_end_time,
            event: ChartEvent::FeverEnd,
        });
        events.push(TimedEvent {
            time: play_time_seconds,
            event: ChartEvent::LiveEnd,
        });

        events.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());
        for pair in events.windows(2) {
            if pair[1].time < pair[0].time - NOTE_ERROR {
                return Err(ChartLoadError::NotSorted { index: 0 });
            }
        }

        if all_note_size == 0 {
            log::warn!("chart has zero notes");
        }

        Ok(Chart {
            events,
            all_note_size,
            fever_start_time,
            fever_end_time,
            play_time_seconds,
        })
    }
}

/// Merges linked hold-note chains (`end_time ≈ next.start_time` and
/// `end_pos == next.start_pos`) into a single logical note per chain, with
/// intermediate judgement points recomputed at half-beat spacing. Ports
/// `RChart.py`'s `_merge_holds`/`_GetHolds_multi_bpm`.
fn merge_hold_chains(
    raw_notes: &[RawNote],
    bpm: &[BpmSegment],
) -> Result<Vec<RawNote>, ChartLoadError> {
    let hold_indices: Vec<usize> = raw_notes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.kind() == Some(NoteKind::Hold))
        .map(|(i, _)| i)
        .collect();

    // next[i] = index (into raw_notes) of the note chained after i, if any.
    let mut next: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
    let mut has_prev: std::collections::HashSet<usize> = std::collections::HashSet::new();

    for (pos, &i) in hold_indices.iter().enumerate() {
        let end_time = raw_notes[i].last_time();
        for &j in &hold_indices[pos + 1..] {
            let next_start = raw_notes[j].start_time;
            if end_time < next_start - NOTE_ERROR {
                break;
            }
            if (end_time - next_start).abs() < NOTE_ERROR && raw_notes[i].end_pos() == raw_notes[j].start_pos()
            {
                next.insert(i, j);
                has_prev.insert(j);
                break;
            }
        }
    }

    let mut processed: std::collections::HashSet<usize> = std::collections::HashSet::new();
    let mut merged: Vec<RawNote> = Vec::new();

    for (i, note) in raw_notes.iter().enumerate() {
        if processed.contains(&i) {
            continue;
        }
        if note.kind() == Some(NoteKind::Hold) && !has_prev.contains(&i) {
            // chain head
            if !next.contains_key(&i) {
                // single-segment hold: keep raw hold_times unchanged
                merged.push(note.clone());
                processed.insert(i);
                continue;
            }
            let mut chain = vec![i];
            let mut cur = i;
            while let Some(&n) = next.get(&cur) {
                chain.push(n);
                cur = n;
            }
            for &c in &chain {
                processed.insert(c);
            }
            let head = &raw_notes[chain[0]];
            let tail = &raw_notes[*chain.last().unwrap()];
            let merged_start = head.start_time;
            let merged_end = tail.last_time();
            let new_hold_times = generate_holds_multi_bpm(merged_start, merged_end, bpm);
            merged.push(RawNote {
                uid: head.uid,
                start_time: merged_start,
                flags: head.flags,
                hold_times: new_hold_times,
            });
        } else if !processed.contains(&i) {
            merged.push(note.clone());
            processed.insert(i);
        }
    }

    merged.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap());
    Ok(merged)
}

/// Intermediate judgement points for a merged hold, stepped at half-beat
/// intervals from the BPM segment in force at `start_time`.
fn generate_holds_multi_bpm(start_time: f64, end_time: f64, bpm: &[BpmSegment]) -> Vec<f64> {
    let mut holds = Vec::new();
    if start_time >= end_time {
        return holds;
    }

    let mut bpm_now = 0.0;
    for seg in bpm {
        if seg.time < start_time {
            bpm_now = seg.bpm;
        } else {
            break;
        }
    }
    if bpm_now <= 0.0 {
        holds.push(end_time);
        return holds;
    }

    let half_beat = (60.0 / bpm_now) * 0.5;
    let mut current = start_time + half_beat;

    while current < end_time - NOTE_ERROR {
        holds.push(current);
        current += half_beat;
        if (current - end_time).abs() < NOTE_ERROR {
            break;
        }
        if current > end_time + NOTE_ERROR && !holds.is_empty() {
            break;
        }
    }

    if holds.last().map(|t| (t - end_time).abs() > NOTE_ERROR).unwrap_or(true) {
        holds.push(end_time);
    }
    holds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(kind: u64, start: (u8, u8), end: (u8, u8)) -> u64 {
        kind | ((start.1 as u64) << 4) | ((end.1 as u64) << 10) | ((start.0 as u64) << 16) | ((end.0 as u64) << 22)
    }

    #[test]
    fn single_note_produces_one_event() {
        let notes = vec![RawNote {
            uid: 1,
            start_time: 1.0,
            flags: flags(0, (0, 0), (0, 0)),
            hold_times: vec![],
        }];
        let chart = Chart::load(&notes, &[], 0.5, 2.0, 3.0).unwrap();
        assert_eq!(chart.all_note_size, 1);
        let note_events: Vec<_> = chart
            .events
            .iter()
            .filter(|e| matches!(e.event, ChartEvent::Note(_)))
            .collect();
        assert_eq!(note_events.len(), 1);
        assert!(matches!(note_events[0].event, ChartEvent::Note(NoteEvent::Single)));
    }

    #[test]
    fn events_are_strictly_sorted() {
        let notes = vec![
            RawNote {
                uid: 1,
                start_time: 2.0,
                flags: flags(2, (0, 0), (0, 0)),
                hold_times: vec![],
            },
            RawNote {
                uid: 2,
                start_time: 1.0,
                flags: flags(3, (0, 0), (0, 0)),
                hold_times: vec![],
            },
        ];
        let chart = Chart::load(&notes, &[], 0.0, 3.0, 4.0).unwrap();
        for pair in chart.events.windows(2) {
            assert!(pair[1].time >= pair[0].time - NOTE_ERROR);
        }
    }

    #[test]
    fn chained_hold_notes_merge_into_one_logical_note() {
        let notes = vec![
            RawNote {
                uid: 1,
                start_time: 0.0,
                flags: flags(1, (10, 10), (10, 10)),
                hold_times: vec![1.0],
            },
            RawNote {
                uid: 2,
                start_time: 1.0,
                flags: flags(1, (10, 10), (20, 20)),
                hold_times: vec![2.0],
            },
        ];
        let bpm = [BpmSegment { time: 0.0, bpm: 120.0 }];
        let chart = Chart::load(&notes, &bpm, 0.0, 3.0, 5.0).unwrap();
        assert_eq!(chart.all_note_size, 1);
        let hold_events: Vec<_> = chart
            .events
            .iter()
            .filter(|e| matches!(e.event, ChartEvent::Note(NoteEvent::Hold) | ChartEvent::Note(NoteEvent::HoldMid)))
            .collect();
        assert!(hold_events.len() >= 2);
    }

    #[test]
    fn empty_chart_is_not_an_error() {
        let chart = Chart::load(&[], &[], 0.0, 1.0, 2.0).unwrap();
        assert_eq!(chart.all_note_size, 0);
    }
}

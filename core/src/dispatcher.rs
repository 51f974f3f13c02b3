//! Work dispatcher (component G): parallelizes the generator's lazy task
//! stream over a rayon worker pool, batches results to shard files, merges
//! shards, deduplicates by card-set keeping the best score, and computes
//! `pt`. Ports `MainBatch.py`'s multiprocessing-pool / batch-shard / merge
//! pipeline — the only concurrency machinery the teacher repo carries is a
//! turn-based single-threaded game loop, so the worker-pool shape instead
//! follows `krukah-robopoker`'s `rayon`/`num_cpus` usage for "many
//! independent CPU-bound units of work over shared read-only state".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::catalog::{Catalog, MusicRecord};
use crate::chart::Chart;
use crate::config::Config;
use crate::deck::Deck;
use crate::error::{CatalogLoadError, DispatchError};
use crate::generator::{self, DeckTask, GeneratorRequest};
use crate::live_card::{LiveCard, DEFAULT_LEVELS};
use crate::simulator;

/// A single persisted result row, matching spec §6's per-song result
/// schema exactly (`pt` omitted entirely when pt computation is disabled).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeckRecord {
    pub deck_card_ids: Vec<i64>,
    pub center_card: i64,
    pub score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pt: Option<i64>,
}

impl DeckRecord {
    fn rank_key(&self) -> i64 {
        self.pt.unwrap_or(self.score)
    }

    fn dedup_key(&self) -> Vec<i64> {
        let mut ids = self.deck_card_ids.clone();
        ids.sort_unstable();
        ids
    }
}

/// Everything a task needs that isn't carried by the [`DeckTask`] itself:
/// the catalog, the song's chart/record, the per-card level triples, and
/// the shared config (Death-Note table, card conflicts, batching knobs).
pub struct SongContext<'a> {
    pub catalog: &'a Catalog,
    pub music: &'a MusicRecord,
    pub chart: &'a Chart,
    pub config: &'a Config,
    /// Card series id -> `[card_level, center_skill_level, skill_level]`;
    /// cards missing from this map use [`DEFAULT_LEVELS`].
    pub card_levels: &'a HashMap<i64, [i64; 3]>,
    /// `task_generator_func`'s `leader_designation`: when set, restricts
    /// center-task expansion to decks whose pinned center slot holds this
    /// exact card id, instead of every card matching the center character.
    pub leader_card_id: Option<i64>,
}

impl<'a> SongContext<'a> {
    fn levels_for(&self, card_series_id: i64) -> [i64; 3] {
        self.card_levels.get(&card_series_id).copied().unwrap_or(DEFAULT_LEVELS)
    }

    fn build_deck(&self, card_ids: &[i64]) -> Result<Deck, CatalogLoadError> {
        let cards: Result<Vec<LiveCard>, CatalogLoadError> = card_ids
            .iter()
            .map(|&id| LiveCard::new(self.catalog, id, self.levels_for(id)))
            .collect();
        Ok(Deck::new(cards?))
    }
}

/// Runs one [`DeckTask`]: builds the deck, simulates the play, and wraps
/// the result in the persisted record shape. A [`crate::error::SimulationGuard`]
/// is not an error here — it is recovered inline the same way
/// `simulator::simulate_play` recovers it, by returning a zero-score record.
fn run_task(ctx: &SongContext, task: &DeckTask) -> Result<DeckRecord, CatalogLoadError> {
    let deck = ctx.build_deck(&task.card_ids)?;
    let result = match simulator::simulate_play(
        ctx.music,
        ctx.chart,
        deck,
        ctx.config.master_level,
        &ctx.config.death_note,
        task.center_index,
    ) {
        Ok(result) => result,
        Err(guard) => {
            log::warn!("simulation guard for deck {:?}: {guard}", task.card_ids);
            return Ok(DeckRecord {
                deck_card_ids: task.card_ids.clone(),
                center_card: 0,
                score: 0,
                pt: None,
            });
        }
    };
    Ok(DeckRecord {
        deck_card_ids: result.card_id_sequence,
        center_card: result.center_card_id,
        score: result.score,
        pt: None,
    })
}

/// `BONUS_SFL` from spec §4.G: fan-level bonus over every singer (including
/// the center character) times the singing-count correction table.
fn bonus_sfl(music: &MusicRecord, config: &Config) -> f64 {
    let mut singer_ids: Vec<i64> = music.singer_character_id.clone();
    if !singer_ids.contains(&music.center_character_id) {
        singer_ids.push(music.center_character_id);
    }
    singer_ids.sort_unstable();
    singer_ids.dedup();

    let sum_bonus: f64 = singer_ids
        .iter()
        .map(|&cid| {
            let level = config.fan_level_for(cid);
            config.fan_level_bonus.get(&level).copied().unwrap_or(0.0)
        })
        .sum();
    let base_bonus = 1.0 + sum_bonus;
    base_bonus * config.season_mode.singing_count_correction(singer_ids.len())
}

/// `pt = floor(score * BONUS_SFL * LIMITBREAK_BONUS[limitbreak_level])`,
/// where `limitbreak_level = max(center_skill_level, skill_level)` of the
/// chosen center card.
fn compute_pt(record: &DeckRecord, ctx: &SongContext, bonus_sfl: f64) -> i64 {
    let [_, center_skill_level, skill_level] = ctx.levels_for(record.center_card);
    let limitbreak_level = center_skill_level.max(skill_level).max(0) as u32;
    let bonus = bonus_sfl * Config::limitbreak_bonus(limitbreak_level);
    (record.score as f64 * bonus).floor() as i64
}

/// Deduplicates by sorted card-id tuple, keeping the highest `rank_key()`
/// (pt if present, else score) for each unique composition — ties keep the
/// first-seen record, matching spec §5's "ties broken by first-seen".
fn dedup_keep_best(records: Vec<DeckRecord>) -> Vec<DeckRecord> {
    let mut best: indexmap::IndexMap<Vec<i64>, DeckRecord> = indexmap::IndexMap::new();
    for record in records {
        let key = record.dedup_key();
        match best.get(&key) {
            Some(existing) if existing.rank_key() >= record.rank_key() => {}
            _ => {
                best.insert(key, record);
            }
        }
    }
    best.into_values().collect()
}

fn write_shard(path: &Path, records: &[DeckRecord]) -> Result<(), DispatchError> {
    let text = serde_json::to_string(records)?;
    std::fs::write(path, text).map_err(|e| DispatchError::ShardIo {
        path: path.display().to_string(),
        source: e,
    })
}

fn read_shard(path: &Path) -> Result<Vec<DeckRecord>, DispatchError> {
    let text = std::fs::read_to_string(path).map_err(|e| DispatchError::ShardIo {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Runs every task the generator yields for `request`, batching completed
/// results to numbered shard files under `shard_dir`, then merges all
/// shards (plus any prior `output_path` contents) into the final
/// pt-augmented, rank-sorted result set and writes it to `output_path`.
pub fn run_song(
    ctx: &SongContext,
    request: &GeneratorRequest,
    shard_dir: &Path,
    output_path: &Path,
) -> Result<Vec<DeckRecord>, DispatchError> {
    std::fs::create_dir_all(shard_dir).map_err(|e| DispatchError::ShardIo {
        path: shard_dir.display().to_string(),
        source: e,
    })?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.config.worker_count())
        .build()
        .expect("worker pool construction cannot fail with a positive thread count");

    let mut in_memory_batch: Vec<DeckRecord> = Vec::with_capacity(ctx.config.batch_size);
    let mut shard_paths: Vec<PathBuf> = Vec::new();
    let mut shard_counter = 0u32;

    let tasks = generator::generate(ctx.catalog, &ctx.config.card_conflicts, request);
    let chunked = itertools::Itertools::chunks(tasks, ctx.config.chunk_size);
    for chunk in &chunked {
        let chunk: Vec<DeckTask> = chunk.collect();
        let chunk_results: Vec<DeckRecord> = pool.install(|| {
            chunk
                .par_iter()
                .filter(|task| match (ctx.leader_card_id, task.center_index) {
                    (Some(leader), Some(i)) => task.card_ids[i] == leader,
                    (Some(_), None) => false,
                    (None, _) => true,
                })
                .filter_map(|task| match run_task(ctx, task) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        log::error!("failed to build deck for task {:?}: {e}", task.card_ids);
                        None
                    }
                })
                .collect()
        });
        in_memory_batch.extend(chunk_results);

        if in_memory_batch.len() >= ctx.config.batch_size {
            shard_counter += 1;
            let shard_path = shard_dir.join(format!("temp_batch_{shard_counter:03}.json"));
            let deduped = dedup_keep_best(std::mem::take(&mut in_memory_batch));
            write_shard(&shard_path, &deduped)?;
            shard_paths.push(shard_path);
        }
    }
    if !in_memory_batch.is_empty() {
        shard_counter += 1;
        let shard_path = shard_dir.join(format!("temp_batch_{shard_counter:03}.json"));
        let deduped = dedup_keep_best(std::mem::take(&mut in_memory_batch));
        write_shard(&shard_path, &deduped)?;
        shard_paths.push(shard_path);
    }

    let mut merged: Vec<DeckRecord> = Vec::new();
    for shard_path in &shard_paths {
        merged.extend(read_shard(shard_path)?);
        let _ = std::fs::remove_file(shard_path);
    }
    merged = dedup_keep_best(merged);

    if ctx.config.compute_pt {
        let bonus = bonus_sfl(ctx.music, ctx.config);
        for record in &mut merged {
            record.pt = Some(compute_pt(record, ctx, bonus));
        }
    }

    if output_path.exists() {
        let prior: Vec<DeckRecord> = read_shard(output_path)?;
        merged.extend(prior);
        merged = dedup_keep_best(merged);
    }

    merged.sort_by(|a, b| b.rank_key().cmp(&a.rank_key()));

    write_shard(output_path, &merged)?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DeckMode;

    fn records(pairs: &[(Vec<i64>, i64)]) -> Vec<DeckRecord> {
        pairs
            .iter()
            .map(|(ids, score)| DeckRecord {
                deck_card_ids: ids.clone(),
                center_card: ids[0],
                score: *score,
                pt: None,
            })
            .collect()
    }

    #[test]
    fn dedup_keeps_best_score_per_composition() {
        let input = records(&[
            (vec![1, 2, 3, 4, 5, 6], 100),
            (vec![6, 5, 4, 3, 2, 1], 200),
            (vec![1, 2, 3, 4, 5, 7], 50),
        ]);
        let deduped = dedup_keep_best(input);
        assert_eq!(deduped.len(), 2);
        let best = deduped.iter().find(|r| r.deck_card_ids == vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(best.score, 200);
    }

    #[test]
    fn bonus_sfl_uses_default_fan_level_when_unspecified() {
        let music = MusicRecord {
            id: 1,
            title: "T".into(),
            music_type: 1,
            center_character_id: 1031,
            singer_character_id: vec![1032, 1033],
            play_time_ms: 1000,
            fever_section_no: 1,
        };
        let config = Config::default();
        // Every singer defaults to fan level 10 (+0.70 each) over 3 singers,
        // with no singing-count correction table in Flat mode.
        let bonus = bonus_sfl(&music, &config);
        assert!((bonus - (1.0 + 0.70 * 3.0)).abs() < 1e-9);
    }

    #[test]
    fn run_song_writes_deterministic_output_for_a_tiny_pool() {
        let dir = std::env::temp_dir().join(format!("dispatcher_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let cards_path = dir.join("cards.json");
        let skills_path = dir.join("skills.json");
        let empty_path = dir.join("empty.json");
        std::fs::write(
            &cards_path,
            serde_json::to_string(&serde_json::json!({
                "1011501": {
                    "card_series_id": 1011501, "name": "a", "description": "",
                    "characters_id": 101, "rarity": 3,
                    "center_skill_series_id": 0, "center_attribute_series_id": 0,
                    "max_smile": [0,0,50,0,0], "max_pure": [0,0,50,0,0],
                    "max_cool": [0,0,50,0,0], "max_mental": [0,0,50,0,0],
                    "rhythm_game_skill_series_id": [3011500]
                }
            }))
            .unwrap(),
        )
        .unwrap();
        std::fs::write(
            &skills_path,
            serde_json::to_string(&serde_json::json!({
                "301150014": {
                    "rhythm_game_skill_condition_ids": ["0"],
                    "rhythm_game_skill_effect_id": [100_010_000],
                    "consume_ap": 1
                }
            }))
            .unwrap(),
        )
        .unwrap();
        std::fs::write(&empty_path, "{}").unwrap();

        let catalog = Catalog::load(&cards_path, &skills_path, &empty_path, &empty_path, &empty_path).unwrap();
        let music = MusicRecord {
            id: 1,
            title: "T".into(),
            music_type: 1,
            center_character_id: 101,
            singer_character_id: vec![101],
            play_time_ms: 5000,
            fever_section_no: 1,
        };
        let chart = Chart::load(
            &[crate::chart::RawNote {
                uid: 1,
                start_time: 1.0,
                flags: 0,
                hold_times: vec![],
            }],
            &[crate::chart::BpmSegment { time: 0.0, bpm: 120.0 }],
            0.5,
            2.0,
            3.0,
        )
        .unwrap();
        let mut config = Config::default();
        config.death_note.clear();
        config.batch_size = 1;

        let ctx = SongContext {
            catalog: &catalog,
            music: &music,
            chart: &chart,
            config: &config,
            card_levels: &HashMap::new(),
            leader_card_id: None,
        };
        let request = GeneratorRequest {
            card_pool: vec![1011501],
            mode: DeckMode::SingleOnly,
            ..Default::default()
        };

        let shard_dir = dir.join("shards");
        let output_path = dir.join("output.json");
        // single-character pool can't fill a 6-card single-only deck, so
        // this exercises the "zero tasks" path end to end without panicking.
        let result = run_song(&ctx, &request, &shard_dir, &output_path).unwrap();
        assert!(result.is_empty());
    }
}

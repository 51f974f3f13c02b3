//! Command-line driver for the deck miner. Hand-rolled `std::env::args`
//! parsing with no flag-parsing crate, matching the teacher's
//! `cli/src/main.rs` style of a plain `std::io`-driven entry point with
//! no `clap` in the dependency table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use deckminer_core::catalog::Catalog;
use deckminer_core::chart::ChartFile;
use deckminer_core::config::Config;
use deckminer_core::dispatcher::{self, DeckRecord, SongContext};
use deckminer_core::error::DispatchError;
use deckminer_core::generator::{DeckMode, GeneratorRequest};
use deckminer_core::optimizer;

struct SongJob {
    music_id: i64,
    difficulty: String,
    mastery_level: u32,
    leader_card_id: i64,
}

struct DebugJob {
    music_id: i64,
    difficulty: String,
    mastery_level: u32,
    card_ids: [i64; 6],
    center_index: Option<usize>,
}

/// `--optimize a.json b.json c.json out.txt`: loads three already-dispatched
/// per-song result files and writes the best-combination text file.
struct OptimizeJob {
    result_paths: [PathBuf; 3],
    output_path: PathBuf,
}

enum Mode {
    Songs(Vec<SongJob>),
    Debug(DebugJob),
    Optimize(OptimizeJob),
}

struct Cli {
    catalog_dir: PathBuf,
    charts_dir: PathBuf,
    output_dir: PathBuf,
    shard_dir: PathBuf,
    config_path: Option<PathBuf>,
    mode: Mode,
}

fn usage() -> String {
    "usage: deckminer [--catalog-dir DIR] [--charts-dir DIR] [--output-dir DIR] \
     [--shard-dir DIR] [--config PATH] \
     (music_id difficulty mastery_level leader_card_id)... \
     | --debug music_id difficulty mastery_level c1 c2 c3 c4 c5 c6 [--center-index N] \
     | --optimize song_a.json song_b.json song_c.json out.txt"
        .to_string()
}

fn parse_args(mut args: std::iter::Peekable<impl Iterator<Item = String>>) -> Result<Cli, String> {
    let mut catalog_dir = PathBuf::from("data");
    let mut charts_dir = PathBuf::from("charts");
    let mut output_dir = PathBuf::from("results");
    let mut shard_dir = PathBuf::from("shards");
    let mut config_path = None;
    let mut positional: Vec<String> = Vec::new();
    let mut debug_mode = false;
    let mut center_index: Option<usize> = None;
    let mut optimize_job: Option<OptimizeJob> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--catalog-dir" => catalog_dir = PathBuf::from(args.next().ok_or("--catalog-dir needs a value")?),
            "--charts-dir" => charts_dir = PathBuf::from(args.next().ok_or("--charts-dir needs a value")?),
            "--output-dir" => output_dir = PathBuf::from(args.next().ok_or("--output-dir needs a value")?),
            "--shard-dir" => shard_dir = PathBuf::from(args.next().ok_or("--shard-dir needs a value")?),
            "--config" => config_path = Some(PathBuf::from(args.next().ok_or("--config needs a value")?)),
            "--debug" => debug_mode = true,
            "--center-index" => {
                let v = args.next().ok_or("--center-index needs a value")?;
                center_index = Some(v.parse().map_err(|_| format!("invalid --center-index value {v}"))?);
            }
            "--optimize" => {
                let a = args.next().ok_or("--optimize needs 4 paths (song_a song_b song_c out)")?;
                let b = args.next().ok_or("--optimize needs 4 paths (song_a song_b song_c out)")?;
                let c = args.next().ok_or("--optimize needs 4 paths (song_a song_b song_c out)")?;
                let out = args.next().ok_or("--optimize needs 4 paths (song_a song_b song_c out)")?;
                optimize_job = Some(OptimizeJob {
                    result_paths: [PathBuf::from(a), PathBuf::from(b), PathBuf::from(c)],
                    output_path: PathBuf::from(out),
                });
            }
            other => positional.push(other.to_string()),
        }
    }

    let mode = if let Some(job) = optimize_job {
        if debug_mode || !positional.is_empty() {
            return Err("--optimize cannot be combined with --debug or song arguments".to_string());
        }
        Mode::Optimize(job)
    } else if debug_mode {
        if positional.len() != 9 {
            return Err(format!(
                "--debug requires music_id difficulty mastery_level and 6 card ids (9 values), got {}",
                positional.len()
            ));
        }
        let music_id = parse_i64(&positional[0], "music_id")?;
        let difficulty = positional[1].clone();
        let mastery_level = parse_u32(&positional[2], "mastery_level")?;
        let mut card_ids = [0i64; 6];
        for (i, slot) in card_ids.iter_mut().enumerate() {
            *slot = parse_i64(&positional[3 + i], "card id")?;
        }
        Mode::Debug(DebugJob {
            music_id,
            difficulty,
            mastery_level,
            card_ids,
            center_index,
        })
    } else {
        if positional.is_empty() || positional.len() % 4 != 0 {
            return Err(format!(
                "song arguments must come in groups of 4 (music_id difficulty mastery_level leader_card_id), got {}",
                positional.len()
            ));
        }
        let mut songs = Vec::with_capacity(positional.len() / 4);
        for chunk in positional.chunks_exact(4) {
            songs.push(SongJob {
                music_id: parse_i64(&chunk[0], "music_id")?,
                difficulty: chunk[1].clone(),
                mastery_level: parse_u32(&chunk[2], "mastery_level")?,
                leader_card_id: parse_i64(&chunk[3], "leader_card_id")?,
            });
        }
        Mode::Songs(songs)
    };

    Ok(Cli {
        catalog_dir,
        charts_dir,
        output_dir,
        shard_dir,
        config_path,
        mode,
    })
}

fn parse_i64(s: &str, field: &str) -> Result<i64, String> {
    s.parse().map_err(|_| format!("invalid {field} value {s:?}"))
}

fn parse_u32(s: &str, field: &str) -> Result<u32, String> {
    s.parse().map_err(|_| format!("invalid {field} value {s:?}"))
}

fn load_catalog(dir: &Path) -> Result<Catalog, DispatchError> {
    Catalog::load(
        dir.join("cards.json"),
        dir.join("skills.json"),
        dir.join("center_skills.json"),
        dir.join("center_attributes.json"),
        dir.join("musics.json"),
    )
    .map_err(DispatchError::from)
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Config(#[from] deckminer_core::error::ConfigError),
}

fn load_chart(charts_dir: &Path, music_id: i64, difficulty: &str) -> Result<deckminer_core::chart::Chart, DispatchError> {
    let path = charts_dir.join(format!("{music_id}_{difficulty}.json"));
    let text = std::fs::read_to_string(&path).map_err(|_| {
        DispatchError::Chart(deckminer_core::error::ChartLoadError::NotFound {
            music_id,
            difficulty: difficulty.to_string(),
        })
    })?;
    let file: ChartFile = serde_json::from_str(&text)?;
    Ok(file.into_chart()?)
}

fn run_song_job(catalog: &Catalog, config: &Config, cli: &Cli, job: &SongJob) -> Result<(), DispatchError> {
    let music = catalog
        .music(job.music_id)
        .ok_or(deckminer_core::error::ChartLoadError::UnknownMusic(job.music_id))?;
    let chart = load_chart(&cli.charts_dir, job.music_id, &job.difficulty)?;

    let mut song_config = config.clone();
    song_config.master_level = job.mastery_level;

    let card_levels: HashMap<i64, [i64; 3]> = HashMap::new();
    let ctx = SongContext {
        catalog,
        music,
        chart: &chart,
        config: &song_config,
        card_levels: &card_levels,
        leader_card_id: if job.leader_card_id == 0 { None } else { Some(job.leader_card_id) },
    };

    let request = GeneratorRequest {
        card_pool: catalog.card_ids().collect(),
        center_character_id: Some(music.center_character_id),
        mode: DeckMode::DoubleAllowed,
        ..Default::default()
    };

    std::fs::create_dir_all(&cli.output_dir).ok();
    let output_path = cli.output_dir.join(format!("simulation_results_{}_{}.json", job.music_id, job.difficulty));
    let shard_dir = cli.shard_dir.join(format!("{}_{}", job.music_id, job.difficulty));

    let records = dispatcher::run_song(&ctx, &request, &shard_dir, &output_path)?;
    log::info!(
        "song {} ({}): {} deck(s) written to {}",
        job.music_id,
        job.difficulty,
        records.len(),
        output_path.display()
    );
    Ok(())
}

fn run_debug_job(catalog: &Catalog, config: &Config, cli: &Cli, job: &DebugJob) -> Result<(), DispatchError> {
    let music = catalog
        .music(job.music_id)
        .ok_or(deckminer_core::error::ChartLoadError::UnknownMusic(job.music_id))?;
    let chart = load_chart(&cli.charts_dir, job.music_id, &job.difficulty)?;

    let cards: Result<Vec<_>, _> = job
        .card_ids
        .iter()
        .map(|&id| deckminer_core::live_card::LiveCard::new(catalog, id, deckminer_core::live_card::DEFAULT_LEVELS))
        .collect();
    let deck = deckminer_core::deck::Deck::new(cards?);

    let result = deckminer_core::simulator::simulate_play(
        music,
        &chart,
        deck,
        job.mastery_level,
        &config.death_note,
        job.center_index,
    );

    match result {
        Ok(result) => {
            println!("score: {}", result.score);
            println!("center card: {}", result.center_card_id);
            println!("deck: {:?}", result.card_id_sequence);
            Ok(())
        }
        Err(guard) => {
            log::warn!("debug play guarded: {guard}");
            println!("score: 0 (guard: {guard})");
            Ok(())
        }
    }
}

fn load_song_results(path: &Path) -> Result<Vec<DeckRecord>, DispatchError> {
    let text = std::fs::read_to_string(path).map_err(|e| DispatchError::ShardIo {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn run_optimize_job(job: &OptimizeJob) -> Result<(), DispatchError> {
    let songs: Result<Vec<Vec<DeckRecord>>, DispatchError> =
        job.result_paths.iter().map(|p| load_song_results(p)).collect();
    let songs = songs?;
    let best = optimizer::optimize(&songs[0], &songs[1], &songs[2]);
    let refs: [&[DeckRecord]; 3] = [&songs[0], &songs[1], &songs[2]];
    let text = optimizer::format_best_combo(&best, &refs);
    std::fs::write(&job.output_path, &text).map_err(|e| DispatchError::ShardIo {
        path: job.output_path.display().to_string(),
        source: e,
    })?;
    log::info!("best combination (total pt {}) written to {}", best.total_pt, job.output_path.display());
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Mode::Optimize(job) = &cli.mode {
        run_optimize_job(job)?;
        return Ok(());
    }

    let catalog = load_catalog(&cli.catalog_dir)?;
    let config = match &cli.config_path {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::default(),
    };

    match &cli.mode {
        Mode::Songs(jobs) => {
            for job in jobs {
                if let Err(e) = run_song_job(&catalog, &config, &cli, job) {
                    log::error!("song {} ({}) failed: {e}", job.music_id, job.difficulty);
                    return Err(e.into());
                }
            }
        }
        Mode::Debug(job) => run_debug_job(&catalog, &config, &cli, job)?,
        Mode::Optimize(_) => unreachable!("handled above"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = std::env::args().skip(1).peekable();
    let cli = match parse_args(args) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("{}", usage());
            return ExitCode::FAILURE;
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> std::iter::Peekable<impl Iterator<Item = String>> {
        words.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter().peekable()
    }

    #[test]
    fn a_single_song_quadruple_parses_into_one_song_job() {
        let cli = parse_args(args(&["123", "hard", "80", "0"])).unwrap();
        match cli.mode {
            Mode::Songs(jobs) => {
                assert_eq!(jobs.len(), 1);
                assert_eq!(jobs[0].music_id, 123);
                assert_eq!(jobs[0].difficulty, "hard");
                assert_eq!(jobs[0].mastery_level, 80);
                assert_eq!(jobs[0].leader_card_id, 0);
            }
            _ => panic!("expected Mode::Songs"),
        }
    }

    #[test]
    fn song_args_not_a_multiple_of_four_are_rejected() {
        let err = parse_args(args(&["123", "hard", "80"])).unwrap_err();
        assert!(err.contains("groups of 4"));
    }

    #[test]
    fn no_args_at_all_is_rejected() {
        let err = parse_args(args(&[])).unwrap_err();
        assert!(err.contains("groups of 4"));
    }

    #[test]
    fn debug_mode_requires_exactly_nine_positional_values() {
        let err = parse_args(args(&["--debug", "123", "hard", "80", "1", "2", "3"])).unwrap_err();
        assert!(err.contains("9 values"));

        let cli = parse_args(args(&[
            "--debug", "123", "hard", "80", "1", "2", "3", "4", "5", "6", "--center-index", "2",
        ]))
        .unwrap();
        match cli.mode {
            Mode::Debug(job) => {
                assert_eq!(job.card_ids, [1, 2, 3, 4, 5, 6]);
                assert_eq!(job.center_index, Some(2));
            }
            _ => panic!("expected Mode::Debug"),
        }
    }

    #[test]
    fn optimize_flag_parses_four_paths_and_rejects_extra_positionals() {
        let cli = parse_args(args(&["--optimize", "a.json", "b.json", "c.json", "out.txt"])).unwrap();
        match cli.mode {
            Mode::Optimize(job) => {
                assert_eq!(job.result_paths, [PathBuf::from("a.json"), PathBuf::from("b.json"), PathBuf::from("c.json")]);
                assert_eq!(job.output_path, PathBuf::from("out.txt"));
            }
            _ => panic!("expected Mode::Optimize"),
        }

        let err = parse_args(args(&["--optimize", "a.json", "b.json", "c.json", "out.txt", "123", "hard", "80", "0"]))
            .unwrap_err();
        assert!(err.contains("cannot be combined"));
    }

    #[test]
    fn custom_directory_flags_override_the_defaults() {
        let cli = parse_args(args(&["--catalog-dir", "data2", "--charts-dir", "charts2", "123", "hard", "80", "0"])).unwrap();
        assert_eq!(cli.catalog_dir, PathBuf::from("data2"));
        assert_eq!(cli.charts_dir, PathBuf::from("charts2"));
    }
}

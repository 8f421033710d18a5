use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use serde::Serialize;
use skrillex::progress::{create_progress_bar, format_duration, log_progress, set_log_only};
use skrillex::safety::validate_recreate_path;
use skrillex::{Db, Options, ReadOptions, ResultSet, SortType};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "skrillex")]
#[command(about = "Import a music library into a skrillex database and inspect the votes")]
struct Args {
    db: PathBuf,

    /// Tab-separated library: song, artist, genre per line
    #[arg(long)]
    import: Option<PathBuf>,

    /// Create the database if it does not exist
    #[arg(long)]
    create: bool,

    /// Drop every table before starting
    #[arg(long)]
    recreate: bool,

    /// Restore an existing session instead of starting a new one
    #[arg(long, default_value = "0")]
    session: i64,

    /// Print the top N songs
    #[arg(long, default_value = "10")]
    top: usize,

    #[arg(long, value_enum, default_value = "counts")]
    sort: SortArg,

    /// Queue, buffer and finish this many songs after importing
    #[arg(long, default_value = "0")]
    play: usize,

    /// Write import statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide progress bars, log progress lines instead
    #[arg(long)]
    log_only: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    None,
    Counts,
    Votes,
}

impl From<SortArg> for SortType {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::None => SortType::None,
            SortArg::Counts => SortType::Counts,
            SortArg::Votes => SortType::Votes,
        }
    }
}

const LOG_INTERVAL: u64 = 1_000;

#[derive(Debug, Default, Serialize)]
struct ImportStats {
    session_id: i64,
    lines: usize,
    skipped: usize,
    mapped: usize,
    failed: usize,
    songs: usize,
    artists: usize,
    genres: usize,
    played: usize,
    elapsed_secs: f64,
}

#[derive(Debug)]
struct LibraryEntry {
    line: usize,
    song: String,
    artist: String,
    genre: String,
}

/// Split one library line. Missing trailing columns are empty.
fn parse_line(line: usize, text: &str) -> Option<LibraryEntry> {
    let text = text.trim_end_matches(|c: char| c == '\r' || c == '\n');
    if text.trim().is_empty() || text.starts_with('#') {
        return None;
    }
    let mut fields = text.split('\t').map(str::trim);
    Some(LibraryEntry {
        line,
        song: fields.next().unwrap_or("").to_string(),
        artist: fields.next().unwrap_or("").to_string(),
        genre: fields.next().unwrap_or("").to_string(),
    })
}

fn import_library(db: &Db, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read library {:?}", path))?;
    let lines: Vec<&str> = contents.lines().collect();
    stats.lines = lines.len();

    let entries: Vec<LibraryEntry> = lines
        .par_iter()
        .enumerate()
        .filter_map(|(i, text)| parse_line(i + 1, text))
        .collect();
    stats.skipped = stats.lines - entries.len();
    info!(path = ?path, entries = entries.len(), skipped = stats.skipped, "Parsed library");

    let mapper = db.mapper();
    let pb = create_progress_bar(entries.len() as u64, "Mapping");
    for (i, entry) in entries.iter().enumerate() {
        match mapper.map(&entry.song, &entry.artist, &entry.genre) {
            Ok(_) => stats.mapped += 1,
            Err(e) => {
                stats.failed += 1;
                warn!(line = entry.line, error = %e, "Skipping library entry");
            }
        }
        pb.inc(1);
        log_progress("Mapping", i as u64 + 1, entries.len() as u64, LOG_INTERVAL);
    }
    pb.finish_with_message("Mapping done");
    Ok(())
}

/// Push the top songs through queue and buffer into play history.
fn play_songs(db: &Db, count: usize) -> Result<usize> {
    let mut songs = ResultSet::new();
    db.get_songs(
        &mut songs,
        &ReadOptions {
            result_limit: count,
            ..ReadOptions::default()
        },
    )?;
    let ids: Vec<u64> = songs.iter().map(|s| s.id).collect();
    db.set_queue(&ids)?;

    for _ in &ids {
        db.buffer_next()?;
        let song = db.song_finished()?;
        info!(id = song.id, name = %song.name, last_played = song.last_played, "Played");
    }
    Ok(ids.len())
}

fn print_top(db: &Db, top: usize, sort: SortType) -> Result<()> {
    let mut songs = ResultSet::new();
    db.get_songs(
        &mut songs,
        &ReadOptions {
            result_limit: top,
            sort,
            filter_buffered: false,
            ..ReadOptions::default()
        },
    )?;

    println!("\n{:=<60}", "");
    println!("Top {} songs (session {})", songs.len(), db.session_id()?);
    for song in &songs {
        println!(
            "  {:>5}  {:<30} {:<20} {:<12} count={} votes={}",
            song.id, song.name, song.artist.name, song.genre.name, song.stats.count, song.stats.votes
        );
    }
    println!("{:=<60}", "");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skrillex=info")))
        .with(fmt::layer())
        .init();

    let args = Args::parse();
    set_log_only(args.log_only);

    if args.session < 0 {
        bail!("--session must be 0 or an existing session id");
    }
    if args.recreate {
        validate_recreate_path(&args.db, args.import.as_deref())?;
    }

    let start = Instant::now();
    let options = Options {
        create_if_missing: args.create || args.recreate,
        recreate: args.recreate,
        session_id: args.session,
        ..Options::default()
    };
    let db = Db::open(&args.db, &options).with_context(|| format!("Failed to open {:?}", args.db))?;

    let mut stats = ImportStats {
        session_id: db.session_id()?,
        ..ImportStats::default()
    };

    if let Some(path) = &args.import {
        import_library(&db, path, &mut stats)?;
    }
    if args.play > 0 {
        stats.played = play_songs(&db, args.play)?;
    }

    let listing = ReadOptions {
        sort: SortType::None,
        inactivity_threshold: 0,
        filter_buffered: false,
        ..ReadOptions::default()
    };
    let mut songs = ResultSet::new();
    let mut artists = ResultSet::new();
    let mut genres = ResultSet::new();
    db.get_songs(&mut songs, &listing)?;
    db.get_artists(&mut artists, &listing)?;
    db.get_genres(&mut genres, &listing)?;
    stats.songs = songs.len();
    stats.artists = artists.len();
    stats.genres = genres.len();

    print_top(&db, args.top, args.sort.into())?;

    stats.elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        mapped = stats.mapped,
        failed = stats.failed,
        songs = stats.songs,
        elapsed = %format_duration(start.elapsed()),
        "Done"
    );

    if let Some(path) = &args.stats {
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write stats {:?}", path))?;
    }

    db.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_fields() {
        let entry = parse_line(3, " Runaway \tKanye West\tHip-Hop\r\n").unwrap();
        assert_eq!(entry.line, 3);
        assert_eq!(entry.song, "Runaway");
        assert_eq!(entry.artist, "Kanye West");
        assert_eq!(entry.genre, "Hip-Hop");
    }

    #[test]
    fn test_parse_line_missing_columns() {
        let entry = parse_line(1, "Kanye - Gay Fish").unwrap();
        assert_eq!(entry.song, "Kanye - Gay Fish");
        assert_eq!(entry.artist, "");
        assert_eq!(entry.genre, "");
    }

    #[test]
    fn test_parse_line_skips_blank_and_comments() {
        assert!(parse_line(1, "   ").is_none());
        assert!(parse_line(2, "# song\tartist\tgenre").is_none());
    }

    #[test]
    fn test_import_and_play() {
        let tmp = tempfile::TempDir::new().unwrap();
        let library = tmp.path().join("library.tsv");
        std::fs::write(
            &library,
            "Runaway\tKanye West\tHip-Hop\n\n\tKanye West\tHip-Hop\nRUNAWAY\tkanye west\t\n",
        )
        .unwrap();

        let db = Db::in_memory().unwrap();
        let mut stats = ImportStats::default();
        import_library(&db, &library, &mut stats).unwrap();
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.mapped, 2);
        assert_eq!(stats.failed, 1);

        assert_eq!(play_songs(&db, 5).unwrap(), 1);
        let mut history = ResultSet::new();
        db.get_play_history(&mut history, &ReadOptions::default()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "Runaway");
    }
}

//! Command-line front end: review a game, mine and drill puzzles, show trends

use std::sync::Arc;

use chess_review_core::analytics::{
    compute_rating_deltas, compute_streaks, rating_delta_from_series, segment_by_opponent_strength,
    strongest_opponent_beaten, Bucket,
};
use chess_review_core::games::GameRecord;
use chess_review_core::storage::{load_puzzles, save_puzzles};
use chess_review_core::{
    build_timeline, classify_game, mine_puzzles, Database, Error, GameMode, LichessClient, Result,
    ReviewConfig, ReviewSession, StockfishEngine,
};
use chrono::Utc;
use shakmaty::Color;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage:
  review analyze <pgn-file>
  review puzzles <username> [max-games]
  review drill <username>
  review trends <username>";

const DEFAULT_MAX_GAMES: usize = 100;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> Result<()> {
    let config = ReviewConfig::from_env()?;

    match args.first().map(String::as_str) {
        Some("analyze") => {
            let path = args.get(1).ok_or_else(usage_error)?;
            analyze(&config, path).await
        }
        Some("puzzles") => {
            let username = args.get(1).ok_or_else(usage_error)?;
            let max_games = match args.get(2) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| Error::Config(format!("max-games must be a number, got {:?}", raw)))?,
                None => DEFAULT_MAX_GAMES,
            };
            puzzles(&config, username, max_games).await
        }
        Some("drill") => {
            let username = args.get(1).ok_or_else(usage_error)?;
            drill(&config, username)
        }
        Some("trends") => {
            let username = args.get(1).ok_or_else(usage_error)?;
            trends(&config, username).await
        }
        _ => Err(usage_error()),
    }
}

fn usage_error() -> Error {
    Error::Config(USAGE.to_string())
}

fn lichess_client(config: &ReviewConfig) -> Result<LichessClient> {
    match &config.lichess_token {
        Some(token) => LichessClient::with_token(token.clone()),
        None => LichessClient::new(),
    }
}

/// Newest-first archive, stopping once `max_games` usable games are in hand
async fn fetch_games(client: &LichessClient, username: &str, max_games: usize, page_size: u32) -> Result<Vec<GameRecord>> {
    let mut games = Vec::new();
    let mut cursor = None;

    loop {
        let page = client.fetch_game_archive(username, cursor, page_size).await?;
        games.extend(page.games);
        if games.len() >= max_games || !page.has_more {
            break;
        }
        cursor = page.next_cursor;
    }

    games.truncate(max_games);
    info!(username, games = games.len(), "archive fetched");
    Ok(games)
}

async fn analyze(config: &ReviewConfig, path: &str) -> Result<()> {
    let transcript = std::fs::read_to_string(path)?;
    let timeline = build_timeline(&transcript)?;

    let engine = StockfishEngine::new(&config.stockfish_path, config.multi_pv).await?;
    let mut session = ReviewSession::new(engine, &timeline, config.eval_timeout);
    session.request_all(config.analysis_depth)?;
    session.settle().await;

    let review = classify_game(&timeline, &session.completed_evaluations());
    session.engine().quit().await?;

    if let (Some(white), Some(black)) = (&timeline.tags.white, &timeline.tags.black) {
        println!("{} vs {}\n", white, black);
    }

    for reviewed in &review.moves {
        match &reviewed.quality {
            Some(quality) => println!(
                "{:>4}. {:<8} {:<11} {}",
                reviewed.ply,
                reviewed.san,
                quality.label.display_name(),
                quality.description
            ),
            None => println!("{:>4}. {:<8} (no evaluation)", reviewed.ply, reviewed.san),
        }
    }

    for color in [Color::White, Color::Black] {
        let summary = review.summary_for(color);
        match (summary.accuracy, summary.average_loss) {
            (Some(accuracy), Some(average)) => {
                println!("\n{:?}: accuracy {:.1}%", color, accuracy);
                println!("  average loss: {:.1} cp", average);
            }
            _ => println!("\n{:?}: not enough evaluated moves for an accuracy figure", color),
        }
        for (label, count) in &summary.counts {
            println!("  {:<11} {}", label.display_name(), count);
        }
        if summary.unclassified > 0 {
            println!("  unclassified {}", summary.unclassified);
        }
    }

    Ok(())
}

async fn puzzles(config: &ReviewConfig, username: &str, max_games: usize) -> Result<()> {
    let miner = config.miner();
    let client = lichess_client(config)?;
    let games = fetch_games(&client, username, max_games, miner.page_size).await?;

    let db = Database::open(&config.db_path)?;
    let existing = load_puzzles(&db, username)?;
    println!("{} puzzles on record, scanning {} games", existing.len(), games.len());

    let engine = Arc::new(StockfishEngine::new(&config.stockfish_path, config.multi_pv).await?);
    let job = mine_puzzles(
        Arc::clone(&engine),
        games,
        username.to_string(),
        existing,
        miner,
        |batch| {
            for puzzle in batch {
                println!(
                    "  move {} in {}: played {}, best {} ({}, -{} cp)",
                    puzzle.move_number,
                    puzzle.game.game_id,
                    puzzle.played_move_uci,
                    puzzle.best_move_uci,
                    puzzle.label.display_name(),
                    puzzle.loss_centipawns
                );
            }
        },
    );

    let set = job.join().await?;
    engine.quit().await?;
    save_puzzles(&db, username, &set)?;
    println!("{} puzzles saved", set.len());

    Ok(())
}

/// Shows one stored puzzle at random, answer last
fn drill(config: &ReviewConfig, username: &str) -> Result<()> {
    let db = Database::open(&config.db_path)?;
    let set = load_puzzles(&db, username)?;

    let Some(puzzle) = set.pick_random(&mut rand::rng()) else {
        println!("No puzzles stored for {}. Run `review puzzles {}` first.", username, username);
        return Ok(());
    };

    println!(
        "{} vs {} ({}), move {}",
        puzzle.game.white, puzzle.game.black, puzzle.game.mode, puzzle.move_number
    );
    println!("{}", puzzle.fen);
    println!("{:?} to play and find the best move.", puzzle.mover);
    println!(
        "\nIn the game: {} ({}, -{} cp). Best: {}",
        puzzle.played_move_uci,
        puzzle.label.display_name(),
        puzzle.loss_centipawns,
        puzzle.best_move_uci
    );
    Ok(())
}

async fn trends(config: &ReviewConfig, username: &str) -> Result<()> {
    let client = lichess_client(config)?;
    let games = fetch_games(&client, username, DEFAULT_MAX_GAMES, config.miner().page_size).await?;
    let now = Utc::now();

    println!("Rating over the last 7 days (recent games):");
    for (mode, delta) in compute_rating_deltas(&games, username, now) {
        if delta.has_data() {
            println!("  {:<15} {:+}", mode, delta.delta);
        }
    }

    match client.rating_history(username).await {
        Ok(history) => {
            println!("Rating over the last 7 days (full history):");
            for (mode, points) in &history {
                let delta = rating_delta_from_series(*mode, points, now);
                if let Some(current) = delta.current_rating {
                    println!("  {:<15} {} ({:+})", mode, current, delta.delta);
                }
            }
        }
        Err(e) => eprintln!("Rating history unavailable: {}", e),
    }

    let streaks = compute_streaks(&games, username);
    println!(
        "\nBest win streak: {} | worst loss streak: {}",
        streaks.best_win_streak, streaks.best_loss_streak
    );

    if let Some(best) = strongest_opponent_beaten(&games, username) {
        println!("Strongest win: {} ({}) in {}", best.name, best.rating, best.game_id);
    }

    for mode in GameMode::ALL {
        if !games.iter().any(|g| g.mode == mode) {
            continue;
        }
        let segments = segment_by_opponent_strength(&games, username, mode);
        println!("\n{}:", mode);
        print_bucket("stronger or equal", &segments.stronger_or_equal);
        print_bucket("weaker", &segments.weaker);
    }

    Ok(())
}

fn print_bucket(name: &str, bucket: &Bucket) {
    match bucket {
        Bucket::Stats(stats) => println!(
            "  vs {:<17} {} games, {:.0}% won, avg diff {:+.0}",
            name,
            stats.games,
            stats.win_rate * 100.0,
            stats.average_rating_diff
        ),
        Bucket::InsufficientData => println!("  vs {:<17} not enough games", name),
    }
}

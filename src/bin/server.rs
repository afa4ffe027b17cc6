//! Live quiz session server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin quizhost-server
//! cargo run --bin quizhost-server -- --port 3000 --quiz-dir ./demos --results-file results.jsonl
//! ```

use std::sync::Arc;

use clap::Parser;
use quizhost::{
    config::Config,
    coordinator::Coordinator,
    logger::setup_logger,
    server::run_server,
    store::{InMemoryQuizStore, JsonLinesResultsSink, LogResultsSink, QuizStore, ResultsSink},
};

#[tokio::main]
async fn main() {
    let config = Config::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    let quiz_store: Arc<dyn QuizStore> = match &config.quiz_dir {
        Some(dir) => match InMemoryQuizStore::load_dir(dir).await {
            Ok(store) => {
                if store.is_empty() {
                    tracing::warn!(dir = %dir.display(), "no quizzes found; hosts must send snapshots");
                }
                tracing::info!(quizzes = store.len(), dir = %dir.display(), "quiz store loaded");
                Arc::new(store)
            }
            Err(error) => {
                tracing::error!(%error, "failed to load quizzes");
                std::process::exit(1);
            }
        },
        None => Arc::new(InMemoryQuizStore::default()),
    };

    let results: Arc<dyn ResultsSink> = match &config.results_file {
        Some(path) => Arc::new(JsonLinesResultsSink::new(path)),
        None => Arc::new(LogResultsSink),
    };

    let coordinator = Coordinator::new(quiz_store, results, config.session_options());

    if let Err(e) = run_server(&config, coordinator).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

//! Runtime configuration of the quiz server

use std::{path::PathBuf, time::Duration};

use clap::{Parser, builder::TypedValueParser};

use crate::{
    constants::session::{DEFAULT_ANSWER_GRACE, MAX_PARTICIPANT_COUNT},
    session,
};

/// Command line and environment configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "quizhost-server")]
#[command(about = "Live quiz session server", long_about = None)]
pub struct Config {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "QUIZHOST_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "QUIZHOST_PORT", default_value = "8080")]
    pub port: u16,

    /// Default log level, overridden by `RUST_LOG`
    #[arg(long, env = "QUIZHOST_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Directory of `<quiz id>.json` files served when a host omits the snapshot
    #[arg(long, env = "QUIZHOST_QUIZ_DIR")]
    pub quiz_dir: Option<PathBuf>,

    /// File receiving one JSON line per finished session
    #[arg(long, env = "QUIZHOST_RESULTS_FILE")]
    pub results_file: Option<PathBuf>,

    /// Seconds added to a question's time limit before answering closes
    #[arg(long, env = "QUIZHOST_ANSWER_GRACE", default_value_t = DEFAULT_ANSWER_GRACE)]
    pub answer_grace: u64,

    /// Maximum number of participants per session
    #[arg(
        long,
        env = "QUIZHOST_MAX_PARTICIPANTS",
        default_value_t = MAX_PARTICIPANT_COUNT,
        value_parser = clap::value_parser!(u64).range(1..=MAX_PARTICIPANT_COUNT as u64).map(|v| v as usize)
    )]
    pub max_participants: usize,
}

impl Config {
    /// Per-session settings derived from the configuration
    pub fn session_options(&self) -> session::Options {
        session::Options {
            answer_grace: Duration::from_secs(self.answer_grace),
            max_participants: self.max_participants,
        }
    }
}

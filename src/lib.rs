//! # Quizhost
//!
//! Live quiz-session coordinator. A host turns a quiz snapshot into a live
//! session, participants join it with a short code and answer questions
//! concurrently, and the coordinator scores answers, keeps the leaderboard
//! consistent and fans events out to the right connections.
//!
//! The library is split the same way the runtime is: pure components
//! ([`scoring`], [`participant`], [`poll`], [`leaderboard`]), the per-session
//! [`session`] state machine, the process-wide [`registry`], and the
//! [`coordinator`] and [`server`] making up the real-time gateway.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
use derive_where::derive_where;
use itertools::Itertools;
use serde::Serialize;

use crate::constants::session::LIST_LIMIT;

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod leaderboard;
pub mod logger;
pub mod participant;
pub mod poll;
pub mod protocol;
pub mod quiz;
pub mod registry;
pub mod scoring;
pub mod server;
pub mod session;
pub mod session_code;
pub mod store;
pub mod tunnel;

/// Messages pushed to hosts and participants
///
/// Each variant serializes to its inner `{"event": ..., "data": ...}`
/// envelope, so clients only ever see the event name.
#[derive(Debug, Serialize, Clone, derive_more::From)]
#[serde(untagged)]
pub enum UpdateMessage {
    /// Session lifecycle, question and scoring events
    Session(session::UpdateMessage),
    /// Poll events
    Poll(poll::UpdateMessage),
}

impl UpdateMessage {
    /// Serializes the message into the text frame sent over the socket
    ///
    /// # Panics
    ///
    /// Panics if serialization fails. Every message is made of strings,
    /// numbers and maps with string keys, which JSON always accepts.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// The head of a list that may be too long to send in full
///
/// Lobby rosters and leaderboards are sent as a [`Preview`]: at most
/// [`LIST_LIMIT`] entries plus the length of the whole list, so clients can
/// still show "and 120 more".
#[derive(Debug, Clone, Serialize)]
#[derive_where(Default)]
#[serde(rename_all = "camelCase")]
pub struct Preview<T> {
    /// Length of the full list
    total: usize,
    /// Leading entries, at most the preview limit
    items: Vec<T>,
}

impl<T> Preview<T> {
    /// Keeps the first [`LIST_LIMIT`] entries of a list of `total` entries
    pub fn of(list: impl IntoIterator<Item = T>, total: usize) -> Self {
        Self::with_limit(list, LIST_LIMIT, total)
    }

    /// Keeps the first `limit` entries of a list of `total` entries
    pub fn with_limit(list: impl IntoIterator<Item = T>, limit: usize, total: usize) -> Self {
        Self {
            total,
            items: list.into_iter().take(limit).collect_vec(),
        }
    }
}

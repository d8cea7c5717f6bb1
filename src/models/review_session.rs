//! Review session: walks a batch of items through reveal, scoring and summary.
//!
//! Each item starts in the question phase. Scores and skips are only accepted in
//! the answer phase of a writable session; both advance the cursor. Items scored
//! 0-2 are appended to the end of the queue so they come back in the same batch.

use super::difficulty_matrix::{self, SharedMatrix};
use super::scheduler::{self, MAX_QUALITY};
use super::{ItemProperties, Phase, Reveal, ReviewItem, SessionSummary};
use crate::database::{CardStore, MatrixStore};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tally key for one decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    Score(u8),
    Skip,
}

pub type Tally = BTreeMap<Outcome, Vec<ReviewItem>>;

/// Called once with the final tally when the session completes.
pub type CompletionCallback = Box<dyn FnOnce(&Tally)>;

pub struct ReviewSession {
    queue: Vec<ReviewItem>,
    cursor: usize,
    phase: Phase,
    tally: Tally,
    read_only: bool,
    complete: bool,
    store: Arc<dyn CardStore>,
    matrix: SharedMatrix,
    matrix_store: Arc<dyn MatrixStore>,
    on_complete: Option<CompletionCallback>,
}

impl ReviewSession {
    /// Creates a session over `queue`, which must not be empty.
    pub fn new(
        queue: Vec<ReviewItem>,
        store: Arc<dyn CardStore>,
        matrix: SharedMatrix,
        matrix_store: Arc<dyn MatrixStore>,
        read_only: bool,
    ) -> Result<Self> {
        if queue.is_empty() {
            return Err(Error::InvalidArgument(
                "a review session needs at least one item".to_string(),
            ));
        }

        info!(items = queue.len(), read_only, "Starting review session");
        Ok(Self {
            queue,
            cursor: 0,
            phase: Phase::Question,
            tally: Tally::new(),
            read_only,
            complete: false,
            store,
            matrix,
            matrix_store,
            on_complete: None,
        })
    }

    pub fn with_completion(mut self, callback: impl FnOnce(&Tally) + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn current(&self) -> Option<ReviewItem> {
        if self.complete {
            None
        } else {
            self.queue.get(self.cursor).copied()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn queue(&self) -> &[ReviewItem] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// 1-based position of the current item, for progress display.
    pub fn position(&self) -> usize {
        (self.cursor + 1).min(self.queue.len())
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Number of score and skip decisions taken so far.
    pub fn decisions(&self) -> usize {
        self.tally.values().map(Vec::len).sum()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_tally(&self.tally)
    }

    /// Content of the current item for the current phase.
    pub fn reveal_current(&self) -> Result<Reveal> {
        let item = self
            .current()
            .ok_or(Error::ActionNotAllowed("session is complete"))?;
        item.reveal(self.phase, self.store.as_ref())
    }

    /// Question -> Answer.
    pub fn reveal(&mut self) {
        if !self.complete {
            self.phase = Phase::Answer;
        }
    }

    /// Answer -> Question.
    pub fn hide(&mut self) {
        if !self.complete {
            self.phase = Phase::Question;
        }
    }

    fn decision_target(&self) -> Result<ReviewItem> {
        if self.read_only {
            return Err(Error::ActionNotAllowed("session is read-only"));
        }
        let item = self
            .current()
            .ok_or(Error::ActionNotAllowed("session is complete"))?;
        if self.phase != Phase::Answer {
            return Err(Error::ActionNotAllowed("answer is not revealed"));
        }
        Ok(item)
    }

    /// Scores the current item, persists its new schedule and advances.
    ///
    /// On failure the cursor, tally, queue and shared matrix are unchanged,
    /// so the same action can be retried.
    pub fn score(&mut self, quality: u8, now: DateTime<Utc>) -> Result<()> {
        if quality > MAX_QUALITY {
            return Err(Error::InvalidArgument(format!(
                "quality must be between 0 and {}, got {}",
                MAX_QUALITY, quality
            )));
        }
        let item = self.decision_target()?;

        let queue_len = self.queue.len();
        if quality < 3 {
            self.queue.push(item);
        }

        if let Err(e) = self.apply_score(item, quality, now) {
            self.queue.truncate(queue_len);
            warn!("Failed to score {}: {}", item.node_id(), e);
            return Err(e);
        }

        if quality < 3 {
            debug!("Re-queued forgotten item {}", item.node_id());
        }
        self.tally.entry(Outcome::Score(quality)).or_default().push(item);
        self.advance();
        Ok(())
    }

    fn apply_score(&self, item: ReviewItem, quality: u8, now: DateTime<Utc>) -> Result<()> {
        let node = item.node(self.store.as_ref())?;
        let current = ItemProperties::from_map(&self.store.read_properties(&node)?);
        let matrix = difficulty_matrix::snapshot(&self.matrix)?;

        let outcome = scheduler::compute_next(
            Some(current.last_interval),
            current.repetitions,
            Some(current.easiness_factor),
            quality,
            &matrix,
        )?;

        let updated = ItemProperties::after_review(&outcome, quality, now);
        self.store.write_properties(&node, &updated.to_map())?;
        difficulty_matrix::commit(&self.matrix, outcome.next_matrix)?;

        info!(
            quality,
            interval = outcome.next_interval,
            repetitions = outcome.next_repetitions,
            "Scored {}",
            item.node_id()
        );
        Ok(())
    }

    /// Records a skip for the current item and advances.
    pub fn skip(&mut self) -> Result<()> {
        let item = self.decision_target()?;
        debug!("Skipped {}", item.node_id());
        self.tally.entry(Outcome::Skip).or_default().push(item);
        self.advance();
        Ok(())
    }

    /// Restores the current item's scheduling fields to their defaults.
    /// Does not move the cursor or touch the tally.
    pub fn reset(&mut self) -> Result<()> {
        if self.read_only {
            return Err(Error::ActionNotAllowed("session is read-only"));
        }
        let item = self
            .current()
            .ok_or(Error::ActionNotAllowed("session is complete"))?;
        let node = item.node(self.store.as_ref())?;
        self.store
            .write_properties(&node, &ItemProperties::reset().to_map())?;
        info!("Reset {}", item.node_id());
        Ok(())
    }

    /// Ends the session early, running completion with the tally so far.
    pub fn end(&mut self) {
        if !self.complete {
            self.finish();
        }
    }

    fn advance(&mut self) {
        if self.cursor + 1 < self.queue.len() {
            self.cursor += 1;
            self.phase = Phase::Question;
        } else {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.complete = true;
        self.cursor = self.queue.len();
        self.phase = Phase::Question;

        if !self.read_only {
            if let Err(e) = difficulty_matrix::flush(&self.matrix, self.matrix_store.as_ref()) {
                warn!("Failed to save difficulty matrix: {}", e);
            }
        }

        info!("Review session complete: {}", self.summary());
        if let Some(callback) = self.on_complete.take() {
            callback(&self.tally);
        }
    }
}

//! End-of-batch summary built from a session tally.
use super::review_session::{Outcome, Tally};
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Items per quality score, indexed 0..=5.
    pub scores: [usize; 6],
    pub skipped: usize,
}

impl SessionSummary {
    pub fn from_tally(tally: &Tally) -> Self {
        let mut summary = Self::default();
        for (outcome, items) in tally {
            match outcome {
                Outcome::Score(q) => {
                    if let Some(slot) = summary.scores.get_mut(usize::from(*q)) {
                        *slot += items.len();
                    }
                }
                Outcome::Skip => summary.skipped += items.len(),
            }
        }
        summary
    }

    pub fn forgotten(&self) -> usize {
        self.scores[..3].iter().sum()
    }

    pub fn remembered(&self) -> usize {
        self.scores[3..].iter().sum()
    }

    pub fn total(&self) -> usize {
        self.forgotten() + self.remembered() + self.skipped
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reviewed: {} remembered, {} forgotten, {} skipped",
            self.total(),
            self.remembered(),
            self.forgotten(),
            self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeId, ReviewItem};

    #[test]
    fn test_counts() {
        let a = ReviewItem::Sided(NodeId(1));
        let b = ReviewItem::Cloze(NodeId(2));
        let mut tally = Tally::new();
        tally.insert(Outcome::Score(0), vec![a]);
        tally.insert(Outcome::Score(4), vec![a, b]);
        tally.insert(Outcome::Skip, vec![b]);

        let summary = SessionSummary::from_tally(&tally);
        assert_eq!(summary.scores, [1, 0, 0, 0, 2, 0]);
        assert_eq!(summary.forgotten(), 1);
        assert_eq!(summary.remembered(), 2);
        assert_eq!(summary.total(), 4);
        assert_eq!(
            summary.to_string(),
            "4 reviewed: 2 remembered, 1 forgotten, 1 skipped"
        );
    }

    #[test]
    fn test_empty_tally() {
        assert_eq!(SessionSummary::from_tally(&Tally::new()).total(), 0);
    }
}

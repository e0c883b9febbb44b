use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type PollId = i64;
pub type OptionId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
}

/// A poll as provisioned. `is_open` gates voting and the open/closed
/// listings; `is_active` is carried along as metadata only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub closes_at: NaiveDateTime,
    pub is_active: bool,
    pub is_open: bool,
    pub options: Vec<PollOption>,
}

impl Poll {
    pub fn has_option(&self, option_id: OptionId) -> bool {
        self.options.iter().any(|opt| opt.id == option_id)
    }
}

/// Per-option vote counts of one poll, in option order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<(OptionId, u64)>,
    baseline: u64,
}

impl Tally {
    /// Every option gets an entry; options missing from `seeded` start at 0.
    pub(crate) fn new(options: &[PollOption], seeded: &HashMap<OptionId, u64>) -> Self {
        let counts: Vec<(OptionId, u64)> = options
            .iter()
            .map(|opt| (opt.id, seeded.get(&opt.id).copied().unwrap_or(0)))
            .collect();
        let baseline = counts.iter().map(|(_, votes)| votes).sum();

        Tally { counts, baseline }
    }

    pub(crate) fn increment(&mut self, option_id: OptionId) -> Option<u64> {
        self.counts
            .iter_mut()
            .find(|(id, _)| *id == option_id)
            .map(|(_, votes)| {
                *votes += 1;
                *votes
            })
    }

    pub fn votes_for(&self, option_id: OptionId) -> Option<u64> {
        self.counts
            .iter()
            .find(|(id, _)| *id == option_id)
            .map(|(_, votes)| *votes)
    }

    pub fn counts(&self) -> &[(OptionId, u64)] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, votes)| votes).sum()
    }

    /// Votes that were already present when the poll was provisioned.
    pub fn baseline(&self) -> u64 {
        self.baseline
    }
}

/// One user's choice on one poll. Never changed once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub user: String,
    pub poll_id: PollId,
    pub option_id: OptionId,
}

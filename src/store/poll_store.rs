use crate::error::StoreError;
use crate::store::models::{OptionId, Poll, PollId, PollOption, Tally};
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::info;

struct PollEntry {
    poll: RwLock<Poll>,
    tally: Mutex<Tally>,
}

/// Shared handle to one poll. Every method here is synchronous and holds
/// its locks only for the call, so nothing can be cancelled halfway.
#[derive(Clone)]
pub struct PollHandle(Arc<PollEntry>);

impl PollHandle {
    pub fn snapshot(&self) -> Poll {
        self.0
            .poll
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn tally(&self) -> Tally {
        self.0
            .tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Counts a vote regardless of `is_open`.
    pub fn increment(&self, option_id: OptionId) -> Result<u64, StoreError> {
        let poll = self.0.poll.read().unwrap_or_else(PoisonError::into_inner);
        self.bump(&poll, option_id)
    }

    /// Counts a vote only while the poll is open. The open flag is held for
    /// the whole call, so a concurrent close lands either before or after.
    pub fn cast(&self, option_id: OptionId) -> Result<u64, StoreError> {
        let poll = self.0.poll.read().unwrap_or_else(PoisonError::into_inner);
        if !poll.is_open {
            return Err(StoreError::PollClosed(poll.id));
        }
        self.bump(&poll, option_id)
    }

    fn bump(&self, poll: &Poll, option_id: OptionId) -> Result<u64, StoreError> {
        let mut tally = self.0.tally.lock().unwrap_or_else(PoisonError::into_inner);
        tally.increment(option_id).ok_or(StoreError::UnknownOption {
            poll_id: poll.id,
            option_id,
        })
    }

    /// Flips `is_open`. Returns the previous value.
    pub fn set_open(&self, open: bool) -> bool {
        let mut poll = self.0.poll.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut poll.is_open, open)
    }

    fn close_if_expired(&self, now: NaiveDateTime) -> Option<PollId> {
        let mut poll = self.0.poll.write().unwrap_or_else(PoisonError::into_inner);
        if poll.is_open && poll.closes_at <= now {
            poll.is_open = false;
            Some(poll.id)
        } else {
            None
        }
    }
}

#[derive(Default)]
struct PollIndex {
    order: Vec<PollId>,
    entries: HashMap<PollId, PollHandle>,
}

/// In-memory home of polls, their options and their tallies.
///
/// Polls keep their provisioning order for listings. Each poll has its own
/// locks, so increments on different polls never contend.
#[derive(Default)]
pub struct PollStore {
    polls: tokio::sync::RwLock<PollIndex>,
}

impl PollStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a poll with optional starting counts per option.
    pub async fn provision(
        &self,
        poll: Poll,
        seeded_votes: &HashMap<OptionId, u64>,
    ) -> Result<(), StoreError> {
        validate(&poll)?;

        let mut index = self.polls.write().await;
        if index.entries.contains_key(&poll.id) {
            return Err(StoreError::DuplicatePoll(poll.id));
        }

        let poll_id = poll.id;
        let entry = PollEntry {
            tally: Mutex::new(Tally::new(&poll.options, seeded_votes)),
            poll: RwLock::new(poll),
        };
        index.order.push(poll_id);
        index.entries.insert(poll_id, PollHandle(Arc::new(entry)));

        info!("Provisioned poll {poll_id}");
        Ok(())
    }

    pub async fn handle(&self, poll_id: PollId) -> Result<PollHandle, StoreError> {
        self.polls
            .read()
            .await
            .entries
            .get(&poll_id)
            .cloned()
            .ok_or(StoreError::PollNotFound(poll_id))
    }

    async fn ordered_handles(&self) -> Vec<PollHandle> {
        let index = self.polls.read().await;
        index
            .order
            .iter()
            .filter_map(|id| index.entries.get(id).cloned())
            .collect()
    }

    pub async fn get(&self, poll_id: PollId) -> Result<Poll, StoreError> {
        Ok(self.handle(poll_id).await?.snapshot())
    }

    async fn list_where(&self, open: bool) -> Vec<Poll> {
        self.ordered_handles()
            .await
            .iter()
            .map(PollHandle::snapshot)
            .filter(|poll| poll.is_open == open)
            .collect()
    }

    pub async fn list_open(&self) -> Vec<Poll> {
        self.list_where(true).await
    }

    pub async fn list_closed(&self) -> Vec<Poll> {
        self.list_where(false).await
    }

    pub async fn options_of(&self, poll_id: PollId) -> Result<Vec<PollOption>, StoreError> {
        Ok(self.get(poll_id).await?.options)
    }

    /// The only place a vote count changes. Returns the option's new count.
    pub async fn increment_tally(
        &self,
        poll_id: PollId,
        option_id: OptionId,
    ) -> Result<u64, StoreError> {
        self.handle(poll_id).await?.increment(option_id)
    }

    pub async fn tally_of(&self, poll_id: PollId) -> Result<Tally, StoreError> {
        Ok(self.handle(poll_id).await?.tally())
    }

    /// Flips `is_open`. Returns the previous value.
    pub async fn set_open(&self, poll_id: PollId, open: bool) -> Result<bool, StoreError> {
        Ok(self.handle(poll_id).await?.set_open(open))
    }

    /// Closes every open poll whose closing time is at or before `now`.
    pub async fn close_expired(&self, now: NaiveDateTime) -> Vec<PollId> {
        self.ordered_handles()
            .await
            .iter()
            .filter_map(|poll| poll.close_if_expired(now))
            .collect()
    }

    /// Holds the poll index exclusively until the guard is dropped.
    #[cfg(test)]
    pub(crate) async fn freeze(&self) -> impl Sized + '_ {
        self.polls.write().await
    }
}

fn validate(poll: &Poll) -> Result<(), StoreError> {
    if poll.options.is_empty() {
        return Err(StoreError::EmptyOptions(poll.id));
    }

    let mut seen = HashSet::new();
    for opt in &poll.options {
        if !seen.insert(opt.id) {
            return Err(StoreError::DuplicateOption {
                poll_id: poll.id,
                option_id: opt.id,
            });
        }
    }

    Ok(())
}

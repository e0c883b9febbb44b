use crate::error::LedgerError;
use crate::store::models::{Ballot, OptionId, PollId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;

/// Ballots cast on one poll. Its lock serializes votes on that poll; every
/// method is synchronous so a held lock is never parked across an await.
#[derive(Clone, Default)]
pub struct PollBallots(Arc<Mutex<HashMap<String, OptionId>>>);

impl PollBallots {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, OptionId>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn voted_option(&self, user: &str) -> Option<OptionId> {
        self.lock().get(user).copied()
    }

    /// Runs `commit` and, only if it succeeds, records the ballot. Both
    /// happen under the poll's lock. Nothing runs and nothing changes when
    /// the user already voted.
    pub fn record_with<F, T, E>(&self, user: &str, option_id: OptionId, commit: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<LedgerError>,
    {
        let mut ballots = self.lock();
        if ballots.contains_key(user) {
            return Err(LedgerError::AlreadyVoted.into());
        }
        let committed = commit()?;
        ballots.insert(user.to_owned(), option_id);
        Ok(committed)
    }

    /// Runs `read` with the ballot count while holding the poll's lock.
    pub fn with_count<F, T>(&self, read: F) -> T
    where
        F: FnOnce(u64) -> T,
    {
        read(self.lock().len() as u64)
    }
}

/// Who voted for what, one ballot per user and poll.
#[derive(Default)]
pub struct BallotLedger {
    polls: RwLock<HashMap<PollId, PollBallots>>,
}

impl BallotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn existing(&self, poll_id: PollId) -> Option<PollBallots> {
        self.polls.read().await.get(&poll_id).cloned()
    }

    /// The poll's ballots, created empty on first use.
    pub async fn ballots_for(&self, poll_id: PollId) -> PollBallots {
        if let Some(ballots) = self.existing(poll_id).await {
            return ballots;
        }
        let mut polls = self.polls.write().await;
        polls.entry(poll_id).or_default().clone()
    }

    pub async fn has_voted(&self, user: &str, poll_id: PollId) -> bool {
        self.voted_option(user, poll_id).await.is_some()
    }

    pub async fn voted_option(&self, user: &str, poll_id: PollId) -> Option<OptionId> {
        self.existing(poll_id).await?.voted_option(user)
    }

    pub async fn record(
        &self,
        user: &str,
        poll_id: PollId,
        option_id: OptionId,
    ) -> Result<(), LedgerError> {
        self.ballots_for(poll_id)
            .await
            .record_with(user, option_id, || Ok(()))
    }

    pub async fn ballot_count(&self, poll_id: PollId) -> u64 {
        match self.existing(poll_id).await {
            Some(ballots) => ballots.with_count(|count| count),
            None => 0,
        }
    }

    pub async fn ballots(&self, poll_id: PollId) -> Vec<Ballot> {
        let Some(ballots) = self.existing(poll_id).await else {
            return Vec::new();
        };
        let mut out: Vec<Ballot> = ballots
            .lock()
            .iter()
            .map(|(user, &option_id)| Ballot {
                user: user.clone(),
                poll_id,
                option_id,
            })
            .collect();
        out.sort_by(|a, b| a.user.cmp(&b.user));
        out
    }
}

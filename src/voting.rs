use crate::error::{AuthError, ConsistencyError, PollError};
use crate::identity::{TokenAuthenticator, UserIdentity};
use crate::store::{
    Ballot, BallotLedger, OptionId, Poll, PollBallots, PollHandle, PollId, PollOption, PollStore,
};
use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::{error, info, warn};

/// A poll as shown to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollView {
    pub id: PollId,
    pub question: String,
    pub closes_at: NaiveDateTime,
    pub is_active: bool,
    pub is_open: bool,
    pub options: Vec<PollOption>,
    pub has_voted: bool,
    pub voted_option_id: Option<OptionId>,
}

impl PollView {
    fn new(poll: Poll, voted_option_id: Option<OptionId>) -> Self {
        PollView {
            id: poll.id,
            question: poll.question,
            closes_at: poll.closes_at,
            is_active: poll.is_active,
            is_open: poll.is_open,
            options: poll.options,
            has_voted: voted_option_id.is_some(),
            voted_option_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionResult {
    pub option_id: OptionId,
    pub text: String,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsView {
    pub poll_id: PollId,
    pub question: String,
    pub total_votes: u64,
    pub options: Vec<OptionResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub poll_id: PollId,
    pub option_id: OptionId,
    pub option_votes: u64,
}

/// Ties authentication, polls and ballots together. Keeps no state of its
/// own beyond the components it was built with.
pub struct VotingService {
    authenticator: TokenAuthenticator,
    store: PollStore,
    ledger: BallotLedger,
    admins: HashSet<String>,
}

impl VotingService {
    pub fn new(authenticator: TokenAuthenticator, store: PollStore, ledger: BallotLedger) -> Self {
        VotingService {
            authenticator,
            store,
            ledger,
            admins: HashSet::new(),
        }
    }

    pub fn with_admins<I, S>(mut self, admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admins = admins.into_iter().map(Into::into).collect();
        self
    }

    pub fn store(&self) -> &PollStore {
        &self.store
    }

    pub fn authenticate(&self, credential: Option<&str>) -> Result<UserIdentity, AuthError> {
        self.authenticator.resolve(credential).inspect_err(|e| {
            warn!("Rejected credential: {}", e.kind());
        })
    }

    pub async fn list_open_polls(
        &self,
        credential: Option<&str>,
    ) -> Result<Vec<PollView>, AuthError> {
        let user = self.authenticate(credential)?;

        let mut views = Vec::new();
        for poll in self.store.list_open().await {
            let voted = self.ledger.voted_option(user.username(), poll.id).await;
            views.push(PollView::new(poll, voted));
        }
        Ok(views)
    }

    /// Closed polls never reveal the caller's past ballot.
    pub async fn list_closed_polls(
        &self,
        credential: Option<&str>,
    ) -> Result<Vec<PollView>, AuthError> {
        self.authenticate(credential)?;

        Ok(self
            .store
            .list_closed()
            .await
            .into_iter()
            .map(|poll| PollView::new(poll, None))
            .collect())
    }

    pub async fn cast_vote(
        &self,
        credential: Option<&str>,
        poll_id: PollId,
        option_id: OptionId,
    ) -> Result<VoteReceipt, PollError> {
        let user = self.authenticate(credential)?;
        let poll = self.store.handle(poll_id).await?;

        let snapshot = poll.snapshot();
        if !snapshot.is_open {
            return Err(PollError::PollClosed);
        }
        if !snapshot.has_option(option_id) {
            return Err(PollError::InvalidOption);
        }

        // Last await. From here on the vote either fully happens or not at all.
        let ballots = self.ledger.ballots_for(poll_id).await;
        let option_votes = commit_vote(&poll, &ballots, user.username(), option_id)
            .inspect_err(|e| {
                warn!(
                    "{} rejected on poll {poll_id}: {}",
                    user.username(),
                    e.kind()
                );
            })?;

        info!(
            "{} voted option {option_id} on poll {poll_id}",
            user.username()
        );

        Ok(VoteReceipt {
            poll_id,
            option_id,
            option_votes,
        })
    }

    /// Available whether the poll is open or closed.
    pub async fn results(
        &self,
        credential: Option<&str>,
        poll_id: PollId,
    ) -> Result<ResultsView, PollError> {
        self.authenticate(credential)?;
        let handle = self.store.handle(poll_id).await?;
        let (poll, tally) = (handle.snapshot(), handle.tally());

        let options = poll
            .options
            .into_iter()
            .map(|opt| OptionResult {
                votes: tally.votes_for(opt.id).unwrap_or(0),
                option_id: opt.id,
                text: opt.text,
            })
            .collect();

        Ok(ResultsView {
            poll_id: poll.id,
            question: poll.question,
            total_votes: tally.total(),
            options,
        })
    }

    /// Admin-only. Closing a closed poll succeeds without change.
    pub async fn close_poll(
        &self,
        credential: Option<&str>,
        poll_id: PollId,
    ) -> Result<(), PollError> {
        let user = self.authenticate(credential)?;
        if !self.admins.contains(user.username()) {
            warn!("{} tried to close poll {poll_id}", user.username());
            return Err(PollError::Forbidden);
        }

        if self.store.set_open(poll_id, false).await? {
            info!("{} closed poll {poll_id}", user.username());
        }
        Ok(())
    }

    /// Replays a ballot from start-up data through the normal record and
    /// increment path. Skips the open check so closed polls keep history.
    pub async fn restore_ballot(&self, ballot: &Ballot) -> Result<(), PollError> {
        let poll = self.store.handle(ballot.poll_id).await?;
        let ballots = self.ledger.ballots_for(ballot.poll_id).await;

        ballots.record_with(&ballot.user, ballot.option_id, || {
            poll.increment(ballot.option_id).map_err(PollError::from)
        })?;
        Ok(())
    }

    /// Checks that the tally holds exactly the seeded votes plus one per
    /// recorded ballot. Reads both under the poll's ballot lock.
    pub async fn audit(&self, poll_id: PollId) -> Result<(), PollError> {
        let poll = self.store.handle(poll_id).await?;
        let ballots = self.ledger.ballots_for(poll_id).await;

        let (tally, ballots) = ballots.with_count(|count| (poll.tally(), count));
        let tallied = tally.total() - tally.baseline();
        if tallied == ballots {
            Ok(())
        } else {
            let violation = ConsistencyError::Desync {
                poll_id,
                tallied,
                ballots,
            };
            error!("{violation}");
            Err(violation.into())
        }
    }
}

/// Records the ballot and counts it as one step under the poll's ballot
/// lock. The open flag is checked again here so a close that won the race
/// is honoured.
fn commit_vote(
    poll: &PollHandle,
    ballots: &PollBallots,
    user: &str,
    option_id: OptionId,
) -> Result<u64, PollError> {
    ballots.record_with(user, option_id, || {
        poll.cast(option_id).map_err(PollError::from)
    })
}

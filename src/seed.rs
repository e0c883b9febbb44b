use crate::error::SeedError;
use crate::identity::Accounts;
use crate::store::{Ballot, BallotLedger, OptionId, Poll, PollId, PollOption, PollStore};
use crate::voting::VotingService;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const BUILTIN: &str = include_str!("../seed/votaciones.json");

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedPoll {
    pub id: PollId,
    pub question: String,
    pub closes_at: NaiveDateTime,
    pub is_active: bool,
    pub is_open: bool,
    pub options: Vec<PollOption>,
    /// Votes cast before this process started, per option id.
    #[serde(default)]
    pub votes: HashMap<OptionId, u64>,
}

/// Start-up data: accounts, polls and known ballots.
#[derive(Debug, Deserialize)]
pub struct Seed {
    pub users: Vec<SeedUser>,
    pub polls: Vec<SeedPoll>,
    #[serde(default)]
    pub ballots: Vec<Ballot>,
}

impl Seed {
    pub fn builtin() -> Result<Self, SeedError> {
        Ok(serde_json::from_str(BUILTIN)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, SeedError> {
        match path {
            Some(path) => {
                info!("Loading seed from {}", path.display());
                Self::from_file(path)
            }
            None => {
                info!("No seed file configured, using built-in polls");
                Self::builtin()
            }
        }
    }

    /// Provisions the stores and replays ballots. Seeded counts are kept as
    /// each poll's baseline; every ballot adds one vote on top.
    pub async fn build(self, admins: &[String]) -> Result<(Accounts, VotingService), SeedError> {
        let users = self.users.into_iter().map(|u| (u.username, u.password));
        let accounts = Accounts::new(users)?;

        let store = PollStore::new();
        for seeded in self.polls {
            let poll = Poll {
                id: seeded.id,
                question: seeded.question,
                closes_at: seeded.closes_at,
                is_active: seeded.is_active,
                is_open: seeded.is_open,
                options: seeded.options,
            };
            store.provision(poll, &seeded.votes).await?;
        }

        let service = VotingService::new(accounts.authenticator(), store, BallotLedger::new())
            .with_admins(admins.iter().cloned());

        for ballot in &self.ballots {
            service
                .restore_ballot(ballot)
                .await
                .map_err(|source| SeedError::Ballot {
                    user: ballot.user.clone(),
                    poll_id: ballot.poll_id,
                    source,
                })?;
        }

        Ok((accounts, service))
    }
}

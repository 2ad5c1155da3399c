//! Server-side query selecting messages that still need a reply
//!
//! The responder performs no client-side re-filtering. A message drops out
//! of the candidate set the moment it carries any user label, so the
//! correctness of dedup rests on Gmail evaluating this query accurately.

use std::fmt;

use crate::client::MailClient;
use crate::error::Result;
use crate::models::MessageRef;

/// The default candidate query
pub const CANDIDATE_QUERY: &str = "-in:chats -from:me -has:userlabels";

/// One exclusion clause of the Gmail search grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Hangouts/Chat transcripts
    Chats,
    /// Anything the account owner sent
    SentByMe,
    /// Anything already carrying a user label, including ours
    UserLabeled,
}

impl Exclusion {
    fn as_query(&self) -> &'static str {
        match self {
            Exclusion::Chats => "-in:chats",
            Exclusion::SentByMe => "-from:me",
            Exclusion::UserLabeled => "-has:userlabels",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualificationFilter {
    exclusions: Vec<Exclusion>,
}

impl Default for QualificationFilter {
    fn default() -> Self {
        Self {
            exclusions: vec![Exclusion::Chats, Exclusion::SentByMe, Exclusion::UserLabeled],
        }
    }
}

impl QualificationFilter {
    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    /// Render the Gmail search query
    pub fn query(&self) -> String {
        self.exclusions
            .iter()
            .map(Exclusion::as_query)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// List candidate messages in the order Gmail returns them
    pub async fn candidates(&self, client: &dyn MailClient) -> Result<Vec<MessageRef>> {
        client.list_candidates(&self.query()).await
    }
}

impl fmt::Display for QualificationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query())
    }
}

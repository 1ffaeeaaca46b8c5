//! Data access for polls, accounts and sessions.
//!
//! Every handler and service talks to storage through [`PollStore`]. The
//! Postgres implementation lives in [`sea`]; [`memory`] backs tests and
//! local runs without a database.

pub mod memory;
pub mod sea;

use crate::orm::{answers, questions, responses, sessions, users};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::DbErr;
use std::sync::Arc;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use sea::SeaStore;

/// Shared handle placed in `web::Data`.
pub type Store = Arc<dyn PollStore>;

/// An answer together with the number of responses that chose it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerWithCount {
    pub answer: answers::Model,
    pub responses: u64,
}

/// One rewritten pointer of a question chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainLink {
    pub question_id: Uuid,
    pub next_question_id: Option<Uuid>,
}

/// Demographic fields a user fills in to complete their profile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Demographics {
    pub birth_date: NaiveDate,
    pub gender: String,
    pub country: String,
    pub city: String,
}

#[async_trait]
pub trait PollStore: Send + Sync {
    // Accounts.
    async fn insert_user(&self, user: users::Model) -> Result<(), DbErr>;
    async fn find_user(&self, id: Uuid) -> Result<Option<users::Model>, DbErr>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr>;
    async fn update_demographics(
        &self,
        id: Uuid,
        demographics: &Demographics,
    ) -> Result<Option<users::Model>, DbErr>;

    // Sessions.
    async fn insert_session(&self, session: sessions::Model) -> Result<(), DbErr>;
    async fn find_session(&self, id: Uuid) -> Result<Option<sessions::Model>, DbErr>;
    async fn delete_session(&self, id: Uuid) -> Result<(), DbErr>;
    /// Deletes sessions that expired at or before `now`. Returns the count.
    async fn delete_expired_sessions(&self, now: NaiveDateTime) -> Result<u64, DbErr>;

    // Questions and answers.
    /// Inserts a question and its answers atomically.
    async fn insert_poll(
        &self,
        question: questions::Model,
        answers: Vec<answers::Model>,
    ) -> Result<(), DbErr>;
    async fn find_question(&self, id: Uuid) -> Result<Option<questions::Model>, DbErr>;
    async fn find_questions(&self, ids: &[Uuid]) -> Result<Vec<questions::Model>, DbErr>;
    /// All questions owned by `owner`, newest first.
    async fn questions_by_owner(&self, owner: Uuid) -> Result<Vec<questions::Model>, DbErr>;
    /// Answers of the given questions in display order, with response counts.
    async fn answers_with_counts(
        &self,
        question_ids: &[Uuid],
    ) -> Result<Vec<AnswerWithCount>, DbErr>;
    /// Clears the next pointer of every linked question, then applies each
    /// link, all inside one transaction. Writes are scoped to `owner`.
    async fn rewrite_chain(&self, owner: Uuid, links: &[ChainLink]) -> Result<(), DbErr>;

    // Responses.
    async fn find_response(
        &self,
        question_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<responses::Model>, DbErr>;
    /// Fails with a unique violation when the user already answered.
    async fn insert_response(&self, response: responses::Model) -> Result<(), DbErr>;
    /// Distinct users who responded to any question owned by `owner`.
    async fn count_respondents(&self, owner: Uuid) -> Result<u64, DbErr>;
}

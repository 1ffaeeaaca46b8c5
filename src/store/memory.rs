use super::{AnswerWithCount, ChainLink, Demographics, PollStore};
use crate::orm::{answers, questions, responses, sessions, users};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sea_orm::DbErr;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, users::Model>,
    sessions: HashMap<Uuid, sessions::Model>,
    questions: HashMap<Uuid, questions::Model>,
    answers: HashMap<Uuid, answers::Model>,
    responses: HashMap<Uuid, responses::Model>,
}

/// Process-local store. Every operation holds a single lock over all tables,
/// so multi-row writes are atomic with respect to other callers.
///
/// Enforces the same unique constraints as the Postgres schema and reports
/// violations with the Postgres wording.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

fn unique_violation(constraint: &str) -> DbErr {
    DbErr::Exec(format!(
        "duplicate key value violates unique constraint \"{}\"",
        constraint
    ))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, DbErr> {
        self.tables
            .read()
            .map_err(|_| DbErr::Custom("memory store lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, DbErr> {
        self.tables
            .write()
            .map_err(|_| DbErr::Custom("memory store lock poisoned".to_owned()))
    }

    /// Inserts a response without the `(question_id, user_id)` check, the
    /// way a schema lacking the constraint would. Lets tests observe what
    /// the constraint prevents.
    pub fn insert_response_unchecked(&self, response: responses::Model) -> Result<(), DbErr> {
        self.write()?.responses.insert(response.id, response);
        Ok(())
    }

    /// Poisons the table lock so every later call fails like a lost
    /// connection would.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.tables.write();
            panic!("poisoning memory store");
        }));
    }

    /// Number of stored responses for a question.
    pub fn response_count(&self, question_id: Uuid) -> Result<usize, DbErr> {
        Ok(self
            .read()?
            .responses
            .values()
            .filter(|r| r.question_id == question_id)
            .count())
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert_user(&self, user: users::Model) -> Result<(), DbErr> {
        let mut tables = self.write()?;
        if tables.users.contains_key(&user.id) {
            return Err(unique_violation("users_pkey"));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(unique_violation("users_email_key"));
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<users::Model>, DbErr> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_demographics(
        &self,
        id: Uuid,
        demographics: &Demographics,
    ) -> Result<Option<users::Model>, DbErr> {
        let mut tables = self.write()?;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.birth_date = Some(demographics.birth_date);
            user.gender = Some(demographics.gender.clone());
            user.country = Some(demographics.country.clone());
            user.city = Some(demographics.city.clone());
            user.clone()
        }))
    }

    async fn insert_session(&self, session: sessions::Model) -> Result<(), DbErr> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&session.user_id) {
            return Err(DbErr::Exec(
                "insert or update on table \"sessions\" violates foreign key constraint".to_owned(),
            ));
        }
        tables.sessions.insert(session.id, session);
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<sessions::Model>, DbErr> {
        Ok(self.read()?.sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), DbErr> {
        self.write()?.sessions.remove(&id);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: NaiveDateTime) -> Result<u64, DbErr> {
        let mut tables = self.write()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn insert_poll(
        &self,
        question: questions::Model,
        answers: Vec<answers::Model>,
    ) -> Result<(), DbErr> {
        let mut tables = self.write()?;
        if tables.questions.contains_key(&question.id) {
            return Err(unique_violation("questions_pkey"));
        }
        if answers.iter().any(|a| tables.answers.contains_key(&a.id)) {
            return Err(unique_violation("answers_pkey"));
        }
        for answer in answers {
            tables.answers.insert(answer.id, answer);
        }
        tables.questions.insert(question.id, question);
        Ok(())
    }

    async fn find_question(&self, id: Uuid) -> Result<Option<questions::Model>, DbErr> {
        Ok(self.read()?.questions.get(&id).cloned())
    }

    async fn find_questions(&self, ids: &[Uuid]) -> Result<Vec<questions::Model>, DbErr> {
        let tables = self.read()?;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        Ok(tables
            .questions
            .values()
            .filter(|q| wanted.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn questions_by_owner(&self, owner: Uuid) -> Result<Vec<questions::Model>, DbErr> {
        let tables = self.read()?;
        let mut questions: Vec<questions::Model> = tables
            .questions
            .values()
            .filter(|q| q.user_id == owner)
            .cloned()
            .collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(questions)
    }

    async fn answers_with_counts(
        &self,
        question_ids: &[Uuid],
    ) -> Result<Vec<AnswerWithCount>, DbErr> {
        let tables = self.read()?;
        let wanted: HashSet<&Uuid> = question_ids.iter().collect();

        let mut counts: HashMap<Uuid, u64> = HashMap::new();
        for response in tables.responses.values() {
            *counts.entry(response.answer_id).or_default() += 1;
        }

        let mut answers: Vec<AnswerWithCount> = tables
            .answers
            .values()
            .filter(|a| wanted.contains(&a.question_id))
            .map(|a| AnswerWithCount {
                answer: a.clone(),
                responses: counts.get(&a.id).copied().unwrap_or(0),
            })
            .collect();
        answers.sort_by(|a, b| {
            a.answer
                .question_id
                .cmp(&b.answer.question_id)
                .then(a.answer.position.cmp(&b.answer.position))
        });
        Ok(answers)
    }

    async fn rewrite_chain(&self, owner: Uuid, links: &[ChainLink]) -> Result<(), DbErr> {
        let now = Utc::now().naive_utc();
        let mut tables = self.write()?;

        for link in links {
            if let Some(question) = tables.questions.get_mut(&link.question_id) {
                if question.user_id == owner {
                    question.next_question_id = None;
                    question.updated_at = Some(now);
                }
            }
        }

        for link in links {
            if let Some(question) = tables.questions.get_mut(&link.question_id) {
                if question.user_id == owner {
                    question.next_question_id = link.next_question_id;
                }
            }
        }

        Ok(())
    }

    async fn find_response(
        &self,
        question_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<responses::Model>, DbErr> {
        Ok(self
            .read()?
            .responses
            .values()
            .find(|r| r.question_id == question_id && r.user_id == Some(user_id))
            .cloned())
    }

    async fn insert_response(&self, response: responses::Model) -> Result<(), DbErr> {
        let mut tables = self.write()?;
        // NULL user ids never collide, as in Postgres.
        if let Some(user_id) = response.user_id {
            if tables
                .responses
                .values()
                .any(|r| r.question_id == response.question_id && r.user_id == Some(user_id))
            {
                return Err(unique_violation("responses_question_id_user_id_key"));
            }
        }
        tables.responses.insert(response.id, response);
        Ok(())
    }

    async fn count_respondents(&self, owner: Uuid) -> Result<u64, DbErr> {
        let tables = self.read()?;
        let respondents: HashSet<Uuid> = tables
            .responses
            .values()
            .filter(|r| {
                tables
                    .questions
                    .get(&r.question_id)
                    .map_or(false, |q| q.user_id == owner)
            })
            .filter_map(|r| r.user_id)
            .collect();
        Ok(respondents.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(owner: Uuid, text: &str) -> questions::Model {
        questions::Model {
            id: Uuid::new_v4(),
            text: text.to_owned(),
            user_id: owner,
            next_question_id: None,
            created_at: Utc::now().naive_utc(),
            updated_at: None,
        }
    }

    fn response(question_id: Uuid, answer_id: Uuid, user_id: Option<Uuid>) -> responses::Model {
        responses::Model {
            id: Uuid::new_v4(),
            question_id,
            answer_id,
            user_id,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[actix_rt::test]
    async fn test_duplicate_response_is_unique_violation() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let q = Uuid::new_v4();
        let a = Uuid::new_v4();

        store.insert_response(response(q, a, Some(user))).await.unwrap();
        let err = store
            .insert_response(response(q, a, Some(user)))
            .await
            .unwrap_err();

        assert!(crate::error::is_unique_violation(&err));
        assert_eq!(store.response_count(q).unwrap(), 1);
    }

    #[actix_rt::test]
    async fn test_anonymous_responses_never_collide() {
        let store = MemoryStore::new();
        let q = Uuid::new_v4();
        let a = Uuid::new_v4();

        store.insert_response(response(q, a, None)).await.unwrap();
        store.insert_response(response(q, a, None)).await.unwrap();

        assert_eq!(store.response_count(q).unwrap(), 2);
    }

    #[actix_rt::test]
    async fn test_rewrite_chain_skips_foreign_rows() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mine = question(owner, "mine");
        let theirs = question(other, "theirs");
        store.insert_poll(mine.clone(), vec![]).await.unwrap();
        store.insert_poll(theirs.clone(), vec![]).await.unwrap();

        store
            .rewrite_chain(
                owner,
                &[
                    ChainLink {
                        question_id: mine.id,
                        next_question_id: Some(theirs.id),
                    },
                    ChainLink {
                        question_id: theirs.id,
                        next_question_id: None,
                    },
                ],
            )
            .await
            .unwrap();

        let mine = store.find_question(mine.id).await.unwrap().unwrap();
        let theirs = store.find_question(theirs.id).await.unwrap().unwrap();
        assert_eq!(mine.next_question_id, Some(theirs.id));
        assert!(mine.updated_at.is_some());
        assert!(theirs.updated_at.is_none());
    }

    #[actix_rt::test]
    async fn test_questions_by_owner_newest_first() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let mut older = question(owner, "older");
        older.created_at -= chrono::Duration::minutes(5);
        let newer = question(owner, "newer");
        store.insert_poll(older.clone(), vec![]).await.unwrap();
        store.insert_poll(newer.clone(), vec![]).await.unwrap();
        store
            .insert_poll(question(Uuid::new_v4(), "someone else"), vec![])
            .await
            .unwrap();

        let listed = store.questions_by_owner(owner).await.unwrap();
        let texts: Vec<&str> = listed.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["newer", "older"]);
    }
}

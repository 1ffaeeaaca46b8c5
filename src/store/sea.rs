use super::{AnswerWithCount, ChainLink, Demographics, PollStore};
use crate::orm::{answers, questions, responses, sessions, users};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, sea_query::Expr, DatabaseConnection, DbBackend, DbErr, FromQueryResult,
    Set, Statement, TransactionTrait,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Postgres-backed store.
#[derive(Clone, Debug)]
pub struct SeaStore {
    db: DatabaseConnection,
}

impl SeaStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct AnswerCount {
    answer_id: Uuid,
    response_count: i64,
}

#[derive(Debug, FromQueryResult)]
struct RespondentCount {
    respondents: i64,
}

fn question_active_model(question: questions::Model) -> questions::ActiveModel {
    questions::ActiveModel {
        id: Set(question.id),
        text: Set(question.text),
        user_id: Set(question.user_id),
        next_question_id: Set(question.next_question_id),
        created_at: Set(question.created_at),
        updated_at: Set(question.updated_at),
    }
}

fn answer_active_model(answer: answers::Model) -> answers::ActiveModel {
    answers::ActiveModel {
        id: Set(answer.id),
        question_id: Set(answer.question_id),
        answer: Set(answer.answer),
        position: Set(answer.position),
        created_at: Set(answer.created_at),
    }
}

#[async_trait]
impl PollStore for SeaStore {
    async fn insert_user(&self, user: users::Model) -> Result<(), DbErr> {
        let user = users::ActiveModel {
            id: Set(user.id),
            email: Set(user.email),
            password: Set(user.password),
            display_name: Set(user.display_name),
            avatar_url: Set(user.avatar_url),
            birth_date: Set(user.birth_date),
            gender: Set(user.gender),
            country: Set(user.country),
            city: Set(user.city),
            created_at: Set(user.created_at),
        };
        users::Entity::insert(user).exec(&self.db).await?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id).one(&self.db).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
    }

    async fn update_demographics(
        &self,
        id: Uuid,
        demographics: &Demographics,
    ) -> Result<Option<users::Model>, DbErr> {
        let res = users::Entity::update_many()
            .col_expr(users::Column::BirthDate, Expr::value(demographics.birth_date))
            .col_expr(users::Column::Gender, Expr::value(demographics.gender.clone()))
            .col_expr(users::Column::Country, Expr::value(demographics.country.clone()))
            .col_expr(users::Column::City, Expr::value(demographics.city.clone()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if res.rows_affected == 0 {
            return Ok(None);
        }
        self.find_user(id).await
    }

    async fn insert_session(&self, session: sessions::Model) -> Result<(), DbErr> {
        let session = sessions::ActiveModel {
            id: Set(session.id),
            user_id: Set(session.user_id),
            created_at: Set(session.created_at),
            expires_at: Set(session.expires_at),
        };
        sessions::Entity::insert(session).exec(&self.db).await?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<sessions::Model>, DbErr> {
        sessions::Entity::find_by_id(id).one(&self.db).await
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), DbErr> {
        sessions::Entity::delete_many()
            .filter(sessions::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: NaiveDateTime) -> Result<u64, DbErr> {
        let res = sessions::Entity::delete_many()
            .filter(sessions::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }

    async fn insert_poll(
        &self,
        question: questions::Model,
        answers: Vec<answers::Model>,
    ) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;

        questions::Entity::insert(question_active_model(question))
            .exec(&txn)
            .await?;

        if !answers.is_empty() {
            answers::Entity::insert_many(answers.into_iter().map(answer_active_model))
                .exec(&txn)
                .await?;
        }

        txn.commit().await
    }

    async fn find_question(&self, id: Uuid) -> Result<Option<questions::Model>, DbErr> {
        questions::Entity::find_by_id(id).one(&self.db).await
    }

    async fn find_questions(&self, ids: &[Uuid]) -> Result<Vec<questions::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        questions::Entity::find()
            .filter(questions::Column::Id.is_in(ids.to_vec()))
            .all(&self.db)
            .await
    }

    async fn questions_by_owner(&self, owner: Uuid) -> Result<Vec<questions::Model>, DbErr> {
        questions::Entity::find()
            .filter(questions::Column::UserId.eq(owner))
            .order_by_desc(questions::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    async fn answers_with_counts(
        &self,
        question_ids: &[Uuid],
    ) -> Result<Vec<AnswerWithCount>, DbErr> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }

        let answers = answers::Entity::find()
            .filter(answers::Column::QuestionId.is_in(question_ids.to_vec()))
            .order_by_asc(answers::Column::QuestionId)
            .order_by_asc(answers::Column::Position)
            .all(&self.db)
            .await?;

        let counts: HashMap<Uuid, u64> = responses::Entity::find()
            .select_only()
            .column(responses::Column::AnswerId)
            .column_as(Expr::col(responses::Column::Id).count(), "response_count")
            .filter(responses::Column::QuestionId.is_in(question_ids.to_vec()))
            .group_by(responses::Column::AnswerId)
            .into_model::<AnswerCount>()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| (row.answer_id, row.response_count.max(0) as u64))
            .collect();

        Ok(answers
            .into_iter()
            .map(|answer| AnswerWithCount {
                responses: counts.get(&answer.id).copied().unwrap_or(0),
                answer,
            })
            .collect())
    }

    async fn rewrite_chain(&self, owner: Uuid, links: &[ChainLink]) -> Result<(), DbErr> {
        let ids: Vec<Uuid> = links.iter().map(|link| link.question_id).collect();
        let now = Utc::now().naive_utc();
        let txn = self.db.begin().await?;

        // Reset first so no old pointer survives next to the new ones.
        questions::Entity::update_many()
            .col_expr(
                questions::Column::NextQuestionId,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(questions::Column::UpdatedAt, Expr::value(now))
            .filter(questions::Column::Id.is_in(ids))
            .filter(questions::Column::UserId.eq(owner))
            .exec(&txn)
            .await?;

        for link in links {
            questions::Entity::update_many()
                .col_expr(
                    questions::Column::NextQuestionId,
                    Expr::value(link.next_question_id),
                )
                .filter(questions::Column::Id.eq(link.question_id))
                .filter(questions::Column::UserId.eq(owner))
                .exec(&txn)
                .await?;
        }

        txn.commit().await
    }

    async fn find_response(
        &self,
        question_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<responses::Model>, DbErr> {
        responses::Entity::find()
            .filter(responses::Column::QuestionId.eq(question_id))
            .filter(responses::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
    }

    async fn insert_response(&self, response: responses::Model) -> Result<(), DbErr> {
        let response = responses::ActiveModel {
            id: Set(response.id),
            question_id: Set(response.question_id),
            answer_id: Set(response.answer_id),
            user_id: Set(response.user_id),
            created_at: Set(response.created_at),
        };
        responses::Entity::insert(response).exec(&self.db).await?;
        Ok(())
    }

    async fn count_respondents(&self, owner: Uuid) -> Result<u64, DbErr> {
        let sql = r#"
            SELECT COUNT(DISTINCT r.user_id) AS respondents
            FROM responses r
            JOIN questions q ON q.id = r.question_id
            WHERE q.user_id = $1
        "#;

        let row = RespondentCount::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            vec![owner.into()],
        ))
        .one(&self.db)
        .await?;

        Ok(row.map(|r| r.respondents.max(0) as u64).unwrap_or(0))
    }
}

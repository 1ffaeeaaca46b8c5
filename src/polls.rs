//! Poll lifecycle: creation, viewing, responding, and the creator's overview.

use crate::app_config::SiteConfig;
use crate::error::PollError;
use crate::orm::{answers, questions, responses};
use crate::stats::{self, DashboardStats};
use crate::store::{AnswerWithCount, PollStore};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Request body for creating a poll.
#[derive(Clone, Debug, Deserialize)]
pub struct PollForm {
    pub text: String,
    #[serde(default)]
    pub answers: Vec<AnswerForm>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnswerForm {
    pub text: String,
}

/// A poll form after trimming, ready for validation.
#[derive(Debug, Validate)]
struct PollDraft {
    #[validate(length(min = 5, message = "Question must be at least 5 characters"))]
    text: String,
    #[validate(
        length(min = 2, message = "At least 2 answers are required"),
        custom = "answers_not_empty"
    )]
    answers: Vec<String>,
}

fn answers_not_empty(answers: &Vec<String>) -> Result<(), ValidationError> {
    if answers.iter().any(|a| a.is_empty()) {
        let mut err = ValidationError::new("empty_answer");
        err.message = Some("Answer cannot be empty".into());
        return Err(err);
    }
    Ok(())
}

impl From<PollForm> for PollDraft {
    fn from(form: PollForm) -> Self {
        Self {
            text: form.text.trim().to_owned(),
            answers: form
                .answers
                .into_iter()
                .map(|a| a.text.trim().to_owned())
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnswerView {
    pub id: Uuid,
    pub text: String,
    pub responses: u64,
    pub percentage: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NextQuestion {
    pub id: Uuid,
    pub text: String,
}

/// A poll as shown to respondents.
#[derive(Clone, Debug, Serialize)]
pub struct PollView {
    pub id: Uuid,
    pub text: String,
    pub created_at: NaiveDateTime,
    pub share_url: String,
    pub total_responses: u64,
    pub answers: Vec<AnswerView>,
    pub has_responded: bool,
    /// Only revealed once the caller has answered.
    pub next_question_id: Option<Uuid>,
}

/// A poll as shown to its creator.
#[derive(Clone, Debug, Serialize)]
pub struct OwnedPollView {
    pub id: Uuid,
    pub text: String,
    pub created_at: NaiveDateTime,
    pub share_url: String,
    pub total_responses: u64,
    pub answers: Vec<AnswerView>,
    pub next_question: Option<NextQuestion>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmittedResponse {
    pub id: Uuid,
    pub question_id: Uuid,
    pub answer_id: Uuid,
    pub next_question_id: Option<Uuid>,
}

/// Ordering for the creator's poll list.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PollSort {
    #[default]
    Newest,
    Oldest,
    Responses,
}

/// Query string for the creator's poll list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PollListQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub sort: PollSort,
}

fn answer_views(answers: &[AnswerWithCount]) -> (u64, Vec<AnswerView>) {
    let counts: Vec<u64> = answers.iter().map(|a| a.responses).collect();
    let tally = stats::tally(&counts);

    let views = answers
        .iter()
        .zip(tally.percentages)
        .map(|(a, percentage)| AnswerView {
            id: a.answer.id,
            text: a.answer.answer.clone(),
            responses: a.responses,
            percentage,
        })
        .collect();

    (tally.total, views)
}

/// Groups answers by question id, keeping their order.
fn group_answers(answers: Vec<AnswerWithCount>) -> HashMap<Uuid, Vec<AnswerWithCount>> {
    let mut grouped: HashMap<Uuid, Vec<AnswerWithCount>> = HashMap::new();
    for answer in answers {
        grouped
            .entry(answer.answer.question_id)
            .or_default()
            .push(answer);
    }
    grouped
}

/// Creates a question and its answers in one store transaction.
pub async fn create_poll(
    store: &dyn PollStore,
    site: &SiteConfig,
    owner: Uuid,
    form: PollForm,
) -> Result<OwnedPollView, PollError> {
    let draft = PollDraft::from(form);
    draft.validate()?;

    let now = Utc::now().naive_utc();
    let question = questions::Model {
        id: Uuid::new_v4(),
        text: draft.text,
        user_id: owner,
        next_question_id: None,
        created_at: now,
        updated_at: None,
    };
    let answers: Vec<answers::Model> = draft
        .answers
        .into_iter()
        .enumerate()
        .map(|(position, text)| answers::Model {
            id: Uuid::new_v4(),
            question_id: question.id,
            answer: text,
            position: position as i32,
            created_at: now,
        })
        .collect();

    store.insert_poll(question.clone(), answers.clone()).await?;

    log::info!(
        "poll_created user_id={} question_id={} answers_count={}",
        owner,
        question.id,
        answers.len()
    );

    let with_counts: Vec<AnswerWithCount> = answers
        .into_iter()
        .map(|answer| AnswerWithCount {
            answer,
            responses: 0,
        })
        .collect();
    let (total_responses, answers) = answer_views(&with_counts);

    Ok(OwnedPollView {
        id: question.id,
        share_url: site.share_url(question.id),
        text: question.text,
        created_at: question.created_at,
        total_responses,
        answers,
        next_question: None,
    })
}

/// Loads a poll for anyone holding its link. Guests see counts only.
pub async fn view_poll(
    store: &dyn PollStore,
    site: &SiteConfig,
    caller: Option<Uuid>,
    question_id: Uuid,
) -> Result<PollView, PollError> {
    let question = store
        .find_question(question_id)
        .await?
        .ok_or(PollError::NotFound("Poll"))?;

    let answers = store.answers_with_counts(&[question.id]).await?;
    let (total_responses, answers) = answer_views(&answers);

    let has_responded = match caller {
        Some(user_id) => store.find_response(question.id, user_id).await?.is_some(),
        None => false,
    };

    Ok(PollView {
        id: question.id,
        share_url: site.share_url(question.id),
        text: question.text,
        created_at: question.created_at,
        total_responses,
        answers,
        has_responded,
        next_question_id: question.next_question_id.filter(|_| has_responded),
    })
}

/// Records `user_id`'s choice of `answer_id` for `question_id`.
pub async fn submit_response(
    store: &dyn PollStore,
    user_id: Uuid,
    question_id: Uuid,
    answer_id: Uuid,
) -> Result<SubmittedResponse, PollError> {
    let question = store
        .find_question(question_id)
        .await?
        .ok_or(PollError::NotFound("Poll"))?;

    let belongs = store
        .answers_with_counts(&[question.id])
        .await?
        .iter()
        .any(|a| a.answer.id == answer_id);
    if !belongs {
        return Err(PollError::validation(
            "That answer does not belong to this poll",
        ));
    }

    if store.find_response(question.id, user_id).await?.is_some() {
        return Err(PollError::conflict("You already answered this question"));
    }

    let response = responses::Model {
        id: Uuid::new_v4(),
        question_id: question.id,
        answer_id,
        user_id: Some(user_id),
        created_at: Utc::now().naive_utc(),
    };

    // The pre-check above races with a concurrent submission from the same
    // user; the unique constraint settles it.
    store
        .insert_response(response.clone())
        .await
        .map_err(|err| PollError::from_unique(err, "You already answered this question"))?;

    log::info!(
        "response_submitted user_id={} question_id={} answer_id={}",
        user_id,
        question.id,
        answer_id
    );

    Ok(SubmittedResponse {
        id: response.id,
        question_id: question.id,
        answer_id,
        next_question_id: question.next_question_id,
    })
}

/// The creator's polls with tallies and next-question details.
pub async fn my_polls(
    store: &dyn PollStore,
    site: &SiteConfig,
    owner: Uuid,
    query: &PollListQuery,
) -> Result<Vec<OwnedPollView>, PollError> {
    let questions = store.questions_by_owner(owner).await?;
    let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let mut grouped = group_answers(store.answers_with_counts(&ids).await?);

    let texts: HashMap<Uuid, String> = questions
        .iter()
        .map(|q| (q.id, q.text.clone()))
        .collect();

    // Chains never cross owners, but a pointer may still name a question that
    // is not in this list; look those up individually.
    let mut next_texts = texts.clone();
    let missing: Vec<Uuid> = questions
        .iter()
        .filter_map(|q| q.next_question_id)
        .filter(|id| !texts.contains_key(id))
        .collect();
    for question in store.find_questions(&missing).await? {
        next_texts.insert(question.id, question.text);
    }

    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut polls: Vec<OwnedPollView> = questions
        .into_iter()
        .filter(|q| match &needle {
            Some(needle) => q.text.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .map(|q| {
            let answers = grouped.remove(&q.id).unwrap_or_default();
            let (total_responses, answers) = answer_views(&answers);
            let next_question = q.next_question_id.and_then(|id| {
                next_texts
                    .get(&id)
                    .map(|text| NextQuestion { id, text: text.clone() })
            });

            OwnedPollView {
                id: q.id,
                share_url: site.share_url(q.id),
                text: q.text,
                created_at: q.created_at,
                total_responses,
                answers,
                next_question,
            }
        })
        .collect();

    match query.sort {
        PollSort::Newest => polls.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        PollSort::Oldest => polls.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        PollSort::Responses => polls.sort_by(|a, b| b.total_responses.cmp(&a.total_responses)),
    }

    Ok(polls)
}

/// Summary statistics over the creator's polls.
pub async fn dashboard(store: &dyn PollStore, owner: Uuid) -> Result<DashboardStats, PollError> {
    let questions = store.questions_by_owner(owner).await?;
    let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let grouped = group_answers(store.answers_with_counts(&ids).await?);

    let totals: Vec<u64> = ids
        .iter()
        .map(|id| {
            grouped
                .get(id)
                .map(|answers| answers.iter().map(|a| a.responses).sum())
                .unwrap_or(0)
        })
        .collect();

    let respondents = store.count_respondents(owner).await?;
    Ok(stats::dashboard_stats(&totals, respondents))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(text: &str, answers: &[&str]) -> PollForm {
        PollForm {
            text: text.to_owned(),
            answers: answers
                .iter()
                .map(|a| AnswerForm {
                    text: (*a).to_owned(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_draft_trims_and_validates() {
        let draft = PollDraft::from(form("  Would you use it?  ", &[" Yes ", "No"]));
        assert_eq!(draft.text, "Would you use it?");
        assert_eq!(draft.answers, vec!["Yes", "No"]);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_draft_rejects_short_question() {
        let draft = PollDraft::from(form("  Hi  ", &["Yes", "No"]));
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_draft_rejects_single_answer() {
        let draft = PollDraft::from(form("Is this enough?", &["Yes"]));
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_draft_rejects_blank_answer() {
        let draft = PollDraft::from(form("Is this enough?", &["Yes", "   "]));
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_sort_parses_lowercase() {
        let query: PollListQuery = serde_json::from_str(r#"{"sort":"responses"}"#).unwrap();
        assert_eq!(query.sort, PollSort::Responses);
        let query: PollListQuery = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(query.sort, PollSort::Newest);
    }
}

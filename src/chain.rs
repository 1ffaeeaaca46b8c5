//! Question chains.
//!
//! A creator's questions can be linked into a sequence through
//! `questions.next_question_id`; respondents follow the pointer after
//! answering. Reordering takes the creator's desired order and rewrites the
//! pointers so the stored chain matches it exactly, the last element ending
//! the chain.
//!
//! Every referenced question is checked for existence and ownership before
//! anything is written, and the store applies the reset and the new links
//! in one transaction. A rejected reorder leaves the chain untouched.

use crate::error::PollError;
use crate::store::{ChainLink, PollStore};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Minimum number of questions a reorder must name.
pub const MIN_CHAIN_LENGTH: usize = 2;

/// One element of a reorder request. Clients post back whole question
/// objects; only the id is read.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct QuestionRef {
    pub id: Uuid,
}

/// Parses a reorder request body.
pub fn parse_order(body: &[u8]) -> Result<Vec<QuestionRef>, PollError> {
    serde_json::from_slice(body).map_err(|e| {
        log::debug!("reorder payload rejected: {}", e);
        PollError::validation("Invalid request format")
    })
}

/// Links each id to its successor; the last id links to nothing.
pub fn chain_links(ids: &[Uuid]) -> Vec<ChainLink> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| ChainLink {
            question_id: *id,
            next_question_id: ids.get(i + 1).copied(),
        })
        .collect()
}

fn validate_order(order: &[QuestionRef]) -> Result<Vec<Uuid>, PollError> {
    if order.len() < MIN_CHAIN_LENGTH {
        return Err(PollError::validation(format!(
            "A chain needs at least {} questions",
            MIN_CHAIN_LENGTH
        )));
    }

    let mut seen = HashSet::with_capacity(order.len());
    for question in order {
        if !seen.insert(question.id) {
            return Err(PollError::validation(format!(
                "Question {} appears more than once",
                question.id
            )));
        }
    }

    Ok(order.iter().map(|q| q.id).collect())
}

/// Rewrites `owner`'s chain to follow `order`. Returns the applied links.
pub async fn reorder_chain(
    store: &dyn PollStore,
    owner: Uuid,
    order: &[QuestionRef],
) -> Result<Vec<ChainLink>, PollError> {
    let ids = validate_order(order)?;

    let found: HashMap<Uuid, Uuid> = store
        .find_questions(&ids)
        .await?
        .into_iter()
        .map(|q| (q.id, q.user_id))
        .collect();

    for id in &ids {
        match found.get(id) {
            None => return Err(PollError::NotFound("Question")),
            Some(user_id) if *user_id != owner => {
                log::warn!(
                    "reorder rejected: user {} does not own question {}",
                    owner,
                    id
                );
                return Err(PollError::Forbidden);
            }
            Some(_) => {}
        }
    }

    let links = chain_links(&ids);
    store.rewrite_chain(owner, &links).await?;

    log::info!("chain_reordered user_id={} length={}", owner, links.len());
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_links_pairs() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let links = chain_links(&[a, b, c]);

        assert_eq!(
            links,
            vec![
                ChainLink {
                    question_id: a,
                    next_question_id: Some(b)
                },
                ChainLink {
                    question_id: b,
                    next_question_id: Some(c)
                },
                ChainLink {
                    question_id: c,
                    next_question_id: None
                },
            ]
        );
    }

    #[test]
    fn test_chain_links_two_elements() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let links = chain_links(&[a, b]);

        assert_eq!(links[0].next_question_id, Some(b));
        assert_eq!(links[1].next_question_id, None);
    }

    #[test]
    fn test_validate_order_rejects_short_input() {
        assert!(matches!(validate_order(&[]), Err(PollError::Validation(_))));
        assert!(matches!(
            validate_order(&[QuestionRef { id: Uuid::new_v4() }]),
            Err(PollError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_order_rejects_duplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let order = [QuestionRef { id: a }, QuestionRef { id: b }, QuestionRef { id: a }];
        assert!(matches!(validate_order(&order), Err(PollError::Validation(_))));
    }

    #[test]
    fn test_parse_order_ignores_extra_fields() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let body = format!(
            r#"[{{"id":"{}","text":"first","answers":[]}},{{"id":"{}"}}]"#,
            a, b
        );

        let order = parse_order(body.as_bytes()).unwrap();

        assert_eq!(order, vec![QuestionRef { id: a }, QuestionRef { id: b }]);
    }

    #[test]
    fn test_parse_order_rejects_non_array() {
        assert!(matches!(
            parse_order(br#"{"id":"not-a-list"}"#),
            Err(PollError::Validation(_))
        ));
        assert!(matches!(parse_order(b"garbage"), Err(PollError::Validation(_))));
    }
}

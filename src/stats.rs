//! Response tallies and dashboard statistics. Pure functions only.

use serde::Serialize;

/// Share of `count` in `total` as a whole percentage, rounded half up.
/// Zero when there are no responses at all.
pub fn percentage(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

/// Totals for one question's answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tally {
    pub total: u64,
    /// One entry per answer, in the order given.
    pub percentages: Vec<u32>,
}

pub fn tally(counts: &[u64]) -> Tally {
    let total = counts.iter().sum();
    Tally {
        total,
        percentages: counts.iter().map(|c| percentage(*c, total)).collect(),
    }
}

/// Summary across all of a creator's polls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub poll_count: u64,
    pub total_responses: u64,
    /// Percentage of polls with at least one response.
    pub completion_rate: u32,
    /// Distinct users who answered any of the polls.
    pub distinct_respondents: u64,
}

/// `poll_totals` holds the total response count of each poll.
pub fn dashboard_stats(poll_totals: &[u64], distinct_respondents: u64) -> DashboardStats {
    let poll_count = poll_totals.len() as u64;
    let answered = poll_totals.iter().filter(|t| **t > 0).count() as u64;

    DashboardStats {
        poll_count,
        total_responses: poll_totals.iter().sum(),
        completion_rate: percentage(answered, poll_count),
        distinct_respondents,
    }
}

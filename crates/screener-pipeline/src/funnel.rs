//! Score-ranked narrowing from stage one to stage two

use std::cmp::Ordering;

use crate::model::ScoreResult;

/// Score descending (IEEE total order), then item id ascending.
pub fn compare(a: &ScoreResult, b: &ScoreResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.item_id.cmp(&b.item_id))
}

/// Every result in report order.
pub fn full_order<'a, I>(results: I) -> Vec<&'a ScoreResult>
where
    I: IntoIterator<Item = &'a ScoreResult>,
{
    let mut ordered: Vec<&ScoreResult> = results.into_iter().collect();
    ordered.sort_by(|a, b| compare(a, b));
    ordered
}

/// Picks the top-K results that go on to detailed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingFunnel {
    top_k: usize,
}

impl RankingFunnel {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// First `min(top_k, n)` results in report order.
    pub fn rank<'a, I>(&self, results: I) -> Vec<&'a ScoreResult>
    where
        I: IntoIterator<Item = &'a ScoreResult>,
    {
        let mut ordered = full_order(results);
        ordered.truncate(self.top_k);
        ordered
    }

    /// Like [`rank`](Self::rank) but degraded results are never eligible.
    pub fn select<'a, I>(&self, results: I) -> Vec<&'a ScoreResult>
    where
        I: IntoIterator<Item = &'a ScoreResult>,
    {
        self.rank(results.into_iter().filter(|r| r.succeeded))
    }
}

use crate::insight::Insight;

/// Session-scoped holder of the insight grid, the analysis history and the
/// last ad-hoc result.
///
/// History is newest-first. Entries only leave it through a full re-seed.
#[derive(Debug, Clone, Default)]
pub struct InsightStore {
    insights: Vec<Insight>,
    history: Vec<Insight>,
    current: Option<Insight>,
    revision: u64,
}

impl InsightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace grid and history with a bulk listing, order preserved.
    pub fn seed(&mut self, insights: Vec<Insight>) {
        self.history = insights.clone();
        self.insights = insights;
        self.revision += 1;
    }

    /// Make `result` the current result and the newest history entry.
    pub fn record_analysis(&mut self, result: Insight) {
        self.place_analysis(result, 0, true);
    }

    /// Insert `result` at `depth` (clamped to the history length). Depth 0 with
    /// `make_current` is the same as `record_analysis`.
    pub fn place_analysis(&mut self, result: Insight, depth: usize, make_current: bool) {
        if make_current {
            self.current = Some(result.clone());
        }
        let at = depth.min(self.history.len());
        self.history.insert(at, result);
        self.revision += 1;
    }

    pub fn history(&self) -> &[Insight] {
        &self.history
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    pub fn current_result(&self) -> Option<&Insight> {
        self.current.as_ref()
    }

    /// Bumped once per mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

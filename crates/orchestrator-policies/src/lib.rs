//! Pluggable strategies (expansion, evaluation, selection, decomposition,
//! merge, memoization) that parameterize the reasoning engine.

pub mod base;
pub mod decomposition;
pub mod evaluation;
pub mod expansion;
pub mod memoization;
pub mod merge;
pub mod selection;

pub use base::{
    DecompositionPolicy, EvaluationPolicy, ExpandedIdea, ExpansionPolicy, MemoizationPolicy,
    MergePolicy, MergeSummary, SelectionPolicy,
};
pub use decomposition::ScoreThresholdDecompositionPolicy;
pub use evaluation::LlmEvaluationPolicy;
pub use expansion::LlmExpansionPolicy;
pub use memoization::InMemoryMemoizationPolicy;
pub use merge::SimpleMergePolicy;
pub use selection::BestScoreSelectionPolicy;

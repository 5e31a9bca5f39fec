//! Survey input: loading, cleaning, description and splitting.

pub mod cleaning;
pub mod descriptives;
pub mod items;
pub mod split;
pub mod survey;

pub use cleaning::{clean_survey, CleanedSample, CleaningSummary, HampelBounds};
pub use descriptives::{describe, DescriptiveReport};
pub use items::ItemResponses;
pub use split::{split_sample, SampleSplit, SplitSummary};
pub use survey::SurveyTable;

// src/matching/mod.rs
pub mod ai_review;
pub mod duplicates;
pub mod hierarchy;
pub mod normalize;
pub mod similarity;

pub use ai_review::{enhance_matches, LlmMatchReviewer, MatchReviewer};
pub use duplicates::{DuplicateMatcher, MatchingConfig, PairScore};
pub use hierarchy::HierarchyClassifier;
pub use normalize::normalize_company_name;
pub use similarity::similarity;

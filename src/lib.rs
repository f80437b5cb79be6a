pub mod assign;
pub mod core;
pub mod evaluate;
pub mod export;
pub mod normalize;
pub mod pipeline;

pub use crate::core::geometry::BBox;
pub use crate::core::model::{DetectedElement, ElementKind, QuestionAssignment};
pub use crate::pipeline::{analyze_page, AnalysisConfig, PageInput, PageReport};

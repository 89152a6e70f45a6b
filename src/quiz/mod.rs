pub mod classify;
pub mod fence;
pub mod grade;
pub mod models;
pub mod parse;

pub use classify::{FENCE, looks_structured};
pub use fence::{has_fence, has_text_after_fence, strip_fences};
pub use grade::{QuizAttempt, Score, Verdict, grade_case_study};
pub use models::{CaseStudyQuestion, ChoiceQuestion, QuizKind, QuizRecord, RawQuestion};
pub use parse::{ParseError, try_parse_quiz};

pub mod normalize;
pub mod utils;
pub mod verdict;

pub use normalize::normalize;
pub use utils::expand_newline_escapes;
pub use verdict::{AbortedRun, FailureDetail, JudgeResponse, Verdict, ALL_PASSED, RUNTIME_ERROR};

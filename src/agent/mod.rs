pub mod conversation;
pub mod dedupe;
pub mod engine;
pub mod rounds;
pub mod verdict;

pub use engine::{ChatEngine, ChatTurnResult, TurnOptions};
pub use verdict::{Recommendation, Severity, Verdict};

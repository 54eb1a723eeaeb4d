pub mod attempt_session;
pub mod attempt_timer;
pub mod eligibility;
pub mod evaluator;
pub mod reveal_policy;

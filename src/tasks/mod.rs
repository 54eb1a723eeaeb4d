pub(crate) mod attempt_clock;

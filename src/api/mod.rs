pub mod client;
pub mod errors;
pub(crate) mod paths;

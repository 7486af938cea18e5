pub mod builder;
pub mod outcome;
pub mod request;
pub(crate) mod runner;

pub mod compute;
pub mod dataset;
pub mod job;
pub mod run;

pub mod diag;
pub mod exercise;
pub mod scenario;

mod report;

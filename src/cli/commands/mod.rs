pub mod batch;
pub mod coverage;


#[cfg(test)]
#[path = "coverage_test.rs"]
mod coverage_test;

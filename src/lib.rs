pub mod coverage;
pub mod debugger;

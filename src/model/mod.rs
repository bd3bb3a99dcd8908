mod match_record;
mod raw;
mod report;

pub use match_record::*;
pub use raw::*;
pub use report::*;

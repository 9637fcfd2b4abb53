pub mod day;
pub mod edit;
pub mod overrides;
pub mod template;

//! Integration tests - mapping file, resolver, splitter and SQL encoders together
//!
//! Everything runs against the station mapping in `tests/fixtures`.

mod fixtures;
mod nested_filter_tests;
mod splitter_properties_tests;

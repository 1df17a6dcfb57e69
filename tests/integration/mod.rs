//! Integration tests for cross-context store synchronization

mod config_integration;
mod store_sync;
mod test_utils;
mod unclonable_values;

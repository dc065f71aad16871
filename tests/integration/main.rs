//! Integration tests for price-relay

mod config_test;
mod pipeline_test;
mod server_test;
mod support;

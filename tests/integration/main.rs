//! Integration tests for sitegraph
//!
//! These tests use wiremock to stand in for crawled sites and the search API.

mod common;
mod cycle_tests;
mod fetch_tests;
mod orchestrator_tests;
mod search_tests;

//! Integration tests for the page generation service

mod auto_gen;
mod config_integration;
mod page_pipeline;
mod test_utils;

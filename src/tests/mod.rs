//! End-to-end tests against a mock deletion endpoint.

mod run_e2e;
mod support;

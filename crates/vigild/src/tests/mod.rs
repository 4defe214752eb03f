//! Test suites for the vigil daemon lifecycle.

mod support;

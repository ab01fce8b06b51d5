//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that scan the chat core sources:
//! - No blocking I/O inside async code
//! - No sleep() calls in production code
//!
//! The tests live under `tests/`; this library is empty.

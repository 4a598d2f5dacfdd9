//! Tests for orchestrator services
//!
//! File-backed services run against temporary directories.

//! Unit tests for provider services

//! Integration test crate for epoch rewarding.
//!
//! This crate has no library code. It only contains integration tests
//! that drive whole rewarding epochs across reward-engine and reward-db
//! against the in-memory chain client.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p reward-integration-tests
//! ```

//! Integration testing module
//!
//! End-to-end tests for the segmenter driven by synthetic packet streams:
//! - Keyframe-aligned segment boundaries
//! - Rolling window eviction and playlist consistency
//! - Timestamp remapping into the muxer
//! - Graceful and fatal termination paths

pub mod e2e;

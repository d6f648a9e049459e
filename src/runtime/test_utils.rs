//! Test utilities for runtime testing
//!
//! This module provides test helpers that can be used by any runtime test
//! without creating circular dependencies.

//! # Integration Test Suite for Energy Potential
//!
//! Cross-module properties of the solar synthesizer, the cache-first downloader and the
//! command line. Unit tests live next to the code they cover.

mod downloader_tests;

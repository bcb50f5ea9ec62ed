#![cfg(test)]

pub mod common;
pub mod demo_tests;
pub mod metadata_roundtrip_tests;

//! Process-level helpers for the marker-sync binary.

pub mod bootstrap;

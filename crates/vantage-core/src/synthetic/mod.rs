//! Deterministic synthetic data generation helpers.
//!
//! These helpers build small terrain scenes for tests and benchmarks: a
//! camera standing on the ground in a UTM-like metric frame, a field of
//! landmarks ahead of it, and their exact pixel projections.
//!
//! Everything is seeded explicitly and ordered stably, so a scene built with
//! the same arguments is bit-identical across runs and platforms.

pub mod noise;
pub mod terrain;

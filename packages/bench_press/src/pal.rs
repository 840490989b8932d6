//! Platform abstraction layer for the harness clocks.
//!
//! This module provides a platform abstraction that allows switching between
//! the real clocks (monotonic wall clock plus the `cpu_time` package for
//! processor time) and fake implementations for testing purposes.

mod abstractions;
mod facade;
#[cfg(test)]
mod fake;
mod real;

pub(crate) use abstractions::Platform;
pub(crate) use facade::PlatformFacade;
#[cfg(test)]
pub(crate) use fake::FakePlatform;
pub(crate) use real::RealPlatform;

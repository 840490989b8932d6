use std::fmt::Debug;
#[cfg(test)]
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use crate::pal::FakePlatform;
use crate::pal::{Platform, RealPlatform};

/// Hides the concrete platform implementation behind a cheaply cloneable
/// value, so every timer of a multi-threaded run can carry its own handle.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Real(RealPlatform),

    #[cfg(test)]
    Fake(Arc<FakePlatform>),
}

impl PlatformFacade {
    pub(crate) fn real() -> Self {
        Self::Real(RealPlatform)
    }

    #[cfg(test)]
    pub(crate) fn fake(fake: FakePlatform) -> Self {
        Self::Fake(Arc::new(fake))
    }
}

impl Platform for PlatformFacade {
    fn real_time(&self) -> Duration {
        match self {
            Self::Real(p) => p.real_time(),
            #[cfg(test)]
            Self::Fake(p) => p.real_time(),
        }
    }

    fn thread_time(&self) -> Duration {
        match self {
            Self::Real(p) => p.thread_time(),
            #[cfg(test)]
            Self::Fake(p) => p.thread_time(),
        }
    }

    fn process_time(&self) -> Duration {
        match self {
            Self::Real(p) => p.process_time(),
            #[cfg(test)]
            Self::Fake(p) => p.process_time(),
        }
    }
}

impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real(p) => p.fmt(f),
            #[cfg(test)]
            Self::Fake(p) => p.fmt(f),
        }
    }
}

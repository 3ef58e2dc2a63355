//! Platform capability detection
//!
//! Distinguishes a real browser-like host from server-side rendering and
//! automated test runs. The overlay container uses this to tag its root node
//! and to clear stale roots left behind by a different rendering context.

/// Environment variable consulted by [`Platform::from_env`]
pub const PLATFORM_ENV_VAR: &str = "STRATA_PLATFORM";

/// Marker written on nodes created outside a real browser
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlatformMarker {
    Test,
    Server,
}

impl PlatformMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformMarker::Test => "test",
            PlatformMarker::Server => "server",
        }
    }
}

/// Capabilities of the rendering environment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Platform {
    /// Rendering into an interactive document
    pub is_browser: bool,
    /// Running under an automated test harness
    pub is_test_environment: bool,
}

impl Platform {
    pub fn browser() -> Self {
        Self {
            is_browser: true,
            is_test_environment: false,
        }
    }

    pub fn server() -> Self {
        Self {
            is_browser: false,
            is_test_environment: false,
        }
    }

    pub fn test() -> Self {
        Self {
            is_browser: false,
            is_test_environment: true,
        }
    }

    /// Parse a platform name (`browser`, `server` or `test`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "browser" => Some(Self::browser()),
            "server" => Some(Self::server()),
            "test" => Some(Self::test()),
            _ => None,
        }
    }

    /// Read the platform from `STRATA_PLATFORM`, defaulting to browser
    pub fn from_env() -> Self {
        match std::env::var(PLATFORM_ENV_VAR) {
            Ok(value) => Self::from_name(&value).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown {} value {:?}, assuming browser",
                    PLATFORM_ENV_VAR,
                    value
                );
                Self::browser()
            }),
            Err(_) => Self::browser(),
        }
    }

    /// Marker for nodes created on this platform (`None` in a real browser)
    pub fn marker(&self) -> Option<PlatformMarker> {
        if self.is_test_environment {
            Some(PlatformMarker::Test)
        } else if !self.is_browser {
            Some(PlatformMarker::Server)
        } else {
            None
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::browser()
    }
}

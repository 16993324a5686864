//! Route locations and region classification.

use std::fmt;

pub const AUTH_GROUP: &str = "(auth)";
pub const APP_GROUP: &str = "(tabs)";
pub const AUTH_ENTRY: &str = "/(auth)/login";
pub const APP_ENTRY: &str = "/(tabs)/home";

/// Current position in the navigation tree as ordered path segments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RouteLocation {
    segments: Vec<String>,
}

impl RouteLocation {
    /// Parse `/a/b/c` style paths. Empty segments are dropped, so `/` is the root.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Self { segments }
    }

    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: segments.into_iter().map(Into::into).collect() }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for RouteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// Top-level navigation subtree a location belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    /// Signed-out experience (sign-in, sign-up).
    Auth,
    /// Signed-in experience (tabs).
    App,
    /// Anything else, including the root and modal routes.
    Other,
}

/// Group names and entry points the guard works with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable {
    pub auth_group: String,
    pub app_group: String,
    pub auth_entry: RouteLocation,
    pub app_entry: RouteLocation,
}

impl RouteTable {
    /// Classify by first segment only.
    #[must_use]
    pub fn classify(&self, location: &RouteLocation) -> Region {
        match location.first() {
            Some(first) if first == self.auth_group => Region::Auth,
            Some(first) if first == self.app_group => Region::App,
            _ => Region::Other,
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            auth_group: AUTH_GROUP.to_owned(),
            app_group: APP_GROUP.to_owned(),
            auth_entry: RouteLocation::parse(AUTH_ENTRY),
            app_entry: RouteLocation::parse(APP_ENTRY),
        }
    }
}

#[cfg(test)]
#[path = "route_test.rs"]
mod tests;

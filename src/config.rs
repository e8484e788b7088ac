use log::warn;

const MAX_PAGES_VAR: &str = "SEGALLOC_MAX_PAGES";
const STRICT_RELEASE_VAR: &str = "SEGALLOC_STRICT_RELEASE";

/// Runtime knobs of a [`crate::SegAlloc`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Upper bound on live pages. `None` grows until the kernel says no.
    pub max_pages: Option<usize>,
    /// Panic on a release that doesn't point at a live block instead of
    /// ignoring it.
    pub strict_release: bool,
}

impl Config {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_strict_release(mut self, strict: bool) -> Self {
        self.strict_release = strict;
        self
    }

    /// Reads `SEGALLOC_MAX_PAGES` and `SEGALLOC_STRICT_RELEASE` from the
    /// process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with variables taken from `lookup`.
    /// Values that don't parse are logged and left at their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(MAX_PAGES_VAR) {
            match value.trim().parse::<usize>() {
                Ok(pages) => config.max_pages = Some(pages),
                Err(err) => warn!("ignoring {MAX_PAGES_VAR}={value:?}: {err}"),
            }
        }

        if let Some(value) = lookup(STRICT_RELEASE_VAR) {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.strict_release = true,
                "0" | "false" | "no" => config.strict_release = false,
                _ => warn!("ignoring {STRICT_RELEASE_VAR}={value:?}"),
            }
        }

        config
    }
}

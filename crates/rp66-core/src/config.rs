//! Configuration for loading logical files

use rp66_formats::visible::DEFAULT_SEARCH_LIMIT;
use serde::{Deserialize, Serialize};

/// Configuration for loading a physical file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Keep promoted objects between queries
    pub cache_metadata: bool,

    /// Bytes searched for the first visible record of each logical file
    pub visible_record_search_limit: usize,

    /// Resolve object references as each logical file is loaded
    pub link_on_load: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            cache_metadata: true,
            visible_record_search_limit: DEFAULT_SEARCH_LIMIT,
            link_on_load: false,
        }
    }
}

impl LoadConfig {
    /// Enable or disable the object cache
    #[must_use]
    pub const fn with_cache_metadata(mut self, enable: bool) -> Self {
        self.cache_metadata = enable;
        self
    }

    /// Set the visible record search window
    #[must_use]
    pub const fn with_search_limit(mut self, limit: usize) -> Self {
        self.visible_record_search_limit = limit;
        self
    }

    /// Link objects as each logical file is loaded
    #[must_use]
    pub const fn with_link_on_load(mut self, enable: bool) -> Self {
        self.link_on_load = enable;
        self
    }
}

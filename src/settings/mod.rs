//! User settings and source overrides.

mod cache;
mod repository;
mod resolver;

pub use cache::MemoryCache;
pub use repository::SettingsRepository;
pub use resolver::{
    validate_setting, ConfigResolver, EffectiveConfig, EffectiveSourceList, Theme, BOOST_KEYWORDS,
    CUSTOM_SOURCES, DEFAULT_TIME_RANGE, DELETED_SOURCES, SETTING_KEYS, THEME,
};

//! Crate-installed log output.
//!
//! All diagnostics go through `tracing`. Applications that install their own
//! subscriber keep full control and can ignore this module. Applications that
//! just want the crate's lifecycle lines on stderr flip
//! [`ManagerConfig::logging_enabled`](crate::ManagerConfig::logging_enabled) or
//! call [`set_logging_enabled`].

use std::sync::OnceLock;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, Registry};

type FilterHandle = reload::Handle<LevelFilter, Registry>;

static LOG_FILTER: OnceLock<Option<FilterHandle>> = OnceLock::new();

fn install() -> Option<FilterHandle> {
    let (filter, handle) = reload::Layer::new(LevelFilter::OFF);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .ok()
        .map(|()| handle)
}

/// Turn crate-installed logging on (debug level) or off.
///
/// The first call installs a global subscriber. Returns `false` if another
/// global subscriber was already installed, in which case the host's
/// configuration is left untouched.
pub fn set_logging_enabled(enabled: bool) -> bool {
    let Some(handle) = LOG_FILTER.get_or_init(install) else {
        return false;
    };

    let level = if enabled {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    };

    handle.modify(|filter| *filter = level).is_ok()
}

/// Check whether crate-installed logging is currently on.
pub fn is_logging_enabled() -> bool {
    LOG_FILTER
        .get()
        .and_then(Option::as_ref)
        .and_then(|handle| handle.clone_current())
        .is_some_and(|level| level != LevelFilter::OFF)
}

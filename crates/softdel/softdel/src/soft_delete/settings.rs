use std::sync::Arc;

use serde::{Deserialize, Serialize};
use softdel_api::prelude::{Catalog, SoftDelResult};

use super::{CascadeManager, SoftDeleteFilter, SoftDeleteHook, TimestampColumns, configure_cascade};
use crate::clock::Clock;
use crate::keys::KeyStrategyRegistry;
use crate::session::Session;

/// A table excluded from soft-delete filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredTableSettings {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
}

/// Soft-delete configuration, as read from a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDeleteSettings {
    /// Nullable timestamp column marking a row as deleted.
    #[serde(default = "default_deletion_column")]
    pub deletion_column: String,
    #[serde(default = "default_created_at_column")]
    pub created_at_column: Option<String>,
    #[serde(default = "default_updated_at_column")]
    pub updated_at_column: Option<String>,
    /// Integer column bumped on every stamped update; none by default.
    #[serde(default)]
    pub version_column: Option<String>,
    /// Whether reads filter soft-deleted rows from the start.
    #[serde(default = "default_filter_active")]
    pub filter_active: bool,
    #[serde(default)]
    pub ignored_tables: Vec<IgnoredTableSettings>,
}

fn default_deletion_column() -> String {
    "deleted_at".to_string()
}

fn default_created_at_column() -> Option<String> {
    Some("created_at".to_string())
}

fn default_updated_at_column() -> Option<String> {
    Some("updated_at".to_string())
}

fn default_filter_active() -> bool {
    true
}

impl Default for SoftDeleteSettings {
    fn default() -> Self {
        Self {
            deletion_column: default_deletion_column(),
            created_at_column: default_created_at_column(),
            updated_at_column: default_updated_at_column(),
            version_column: None,
            filter_active: default_filter_active(),
            ignored_tables: Vec::new(),
        }
    }
}

/// The soft-delete components of a process: the read filter, the cascade manager and the
/// before-commit hook, sharing one deletion column.
#[derive(Debug, Clone)]
pub struct SoftDelete {
    filter: Arc<SoftDeleteFilter>,
    cascade: Arc<CascadeManager>,
    hook: Arc<SoftDeleteHook>,
}

impl SoftDelete {
    pub fn from_settings(
        settings: &SoftDeleteSettings,
        keys: Arc<KeyStrategyRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let filter = settings.ignored_tables.iter().fold(
            SoftDeleteFilter::new(&settings.deletion_column),
            |filter, table| filter.ignore_table(&table.name, table.schema.as_deref()),
        );
        if !settings.filter_active {
            filter.deactivate();
        }

        let cascade = configure_cascade(&settings.deletion_column);
        let hook = SoftDeleteHook::new(cascade.clone(), keys, clock).with_columns(TimestampColumns {
            created_at: settings.created_at_column.clone(),
            updated_at: settings.updated_at_column.clone(),
            version: settings.version_column.clone(),
        });

        Self {
            filter: Arc::new(filter),
            cascade,
            hook: Arc::new(hook),
        }
    }

    pub fn filter(&self) -> &Arc<SoftDeleteFilter> {
        &self.filter
    }

    pub fn cascade(&self) -> &Arc<CascadeManager> {
        &self.cascade
    }

    pub fn hook(&self) -> &Arc<SoftDeleteHook> {
        &self.hook
    }

    /// Checks `catalog` against the cascade configuration and the key strategies.
    pub fn validate(&self, catalog: &Catalog) -> SoftDelResult<()> {
        self.cascade.validate(catalog)?;
        for table in catalog.tables() {
            self.hook.keys().validate_table(table)?;
        }

        Ok(())
    }

    /// Validates the catalog of `session`, then registers the read filter and the
    /// before-commit hook on it.
    ///
    /// A catalog rejected by [`SoftDelete::validate`] leaves the session untouched.
    pub fn attach(&self, session: &mut Session<'_>) -> SoftDelResult<()> {
        self.validate(session.catalog())?;
        session.add_interceptor(self.filter.clone());
        session.add_hook(self.hook.clone());

        Ok(())
    }
}

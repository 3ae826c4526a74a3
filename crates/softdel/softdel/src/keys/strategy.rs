use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use softdel_api::prelude::{
    ConfigError, GenerationError, KeyStrategy, MAX_COMPACT_LENGTH, MIN_COMPACT_LENGTH,
    SessionError, SoftDelResult, Storage, TableDef, Value,
};
use uuid::Uuid;

use super::{DistributedIdGenerator, compact_identifier, generate_with_retry};
use crate::clock::{Clock, SystemClock};

/// User supplied key generator for [`KeyStrategy::Custom`].
pub type CustomGenerator = Arc<dyn Fn() -> SoftDelResult<Value> + Send + Sync>;

const DEFAULT_COMPACT_LENGTH: usize = 16;
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Parameters of the key strategies.
#[derive(Clone)]
pub struct KeyStrategyParams {
    /// Length of [`KeyStrategy::CompactIdentifier`] keys, between 8 and 32.
    pub compact_length: usize,
    /// Worker id of the distributed generator, between 0 and 31.
    pub worker_id: u8,
    /// Datacenter id of the distributed generator, between 0 and 31.
    pub datacenter_id: u8,
    /// Generator used by [`KeyStrategy::Custom`].
    pub custom_generator: Option<CustomGenerator>,
    /// How many keys are drawn before giving up on collisions; at least 1.
    pub max_retries: u32,
}

impl std::fmt::Debug for KeyStrategyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStrategyParams")
            .field("compact_length", &self.compact_length)
            .field("worker_id", &self.worker_id)
            .field("datacenter_id", &self.datacenter_id)
            .field("custom_generator", &self.custom_generator.is_some())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for KeyStrategyParams {
    fn default() -> Self {
        Self {
            compact_length: DEFAULT_COMPACT_LENGTH,
            worker_id: 0,
            datacenter_id: 0,
            custom_generator: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl KeyStrategyParams {
    pub fn with_custom_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> SoftDelResult<Value> + Send + Sync + 'static,
    {
        self.custom_generator = Some(Arc::new(generator));
        self
    }

    fn validate(&self, strategy: KeyStrategy) -> Result<(), ConfigError> {
        if !(MIN_COMPACT_LENGTH..=MAX_COMPACT_LENGTH).contains(&self.compact_length) {
            return Err(ConfigError::CompactLengthOutOfRange(self.compact_length));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidRetryCount);
        }
        if strategy == KeyStrategy::Custom && self.custom_generator.is_none() {
            return Err(ConfigError::MissingCustomGenerator);
        }

        Ok(())
    }
}

/// Key strategy configuration, as read from a configuration file.
///
/// The custom generator can only be supplied programmatically, through
/// [`KeyStrategyParams::with_custom_generator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStrategySettings {
    #[serde(default)]
    pub strategy: KeyStrategy,
    #[serde(default = "default_compact_length")]
    pub compact_length: usize,
    #[serde(default)]
    pub worker_id: u8,
    #[serde(default)]
    pub datacenter_id: u8,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_compact_length() -> usize {
    DEFAULT_COMPACT_LENGTH
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for KeyStrategySettings {
    fn default() -> Self {
        Self {
            strategy: KeyStrategy::default(),
            compact_length: DEFAULT_COMPACT_LENGTH,
            worker_id: 0,
            datacenter_id: 0,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl From<&KeyStrategySettings> for KeyStrategyParams {
    fn from(settings: &KeyStrategySettings) -> Self {
        Self {
            compact_length: settings.compact_length,
            worker_id: settings.worker_id,
            datacenter_id: settings.datacenter_id,
            custom_generator: None,
            max_retries: settings.max_retries,
        }
    }
}

#[derive(Debug)]
struct ActiveStrategy {
    strategy: KeyStrategy,
    params: KeyStrategyParams,
    generator: Arc<DistributedIdGenerator>,
}

/// Holds the active key strategy and its parameters.
///
/// The registry is configured once at start and shared behind an [`Arc`]; it is read-only
/// afterwards, except for [`KeyStrategyRegistry::reset`]. Tables may override the active
/// strategy through [`TableDef::key_strategy`].
pub struct KeyStrategyRegistry {
    clock: Arc<dyn Clock>,
    active: RwLock<ActiveStrategy>,
}

impl std::fmt::Debug for KeyStrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStrategyRegistry")
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl Default for KeyStrategyRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl KeyStrategyRegistry {
    /// Creates a registry with the [`KeyStrategy::Sequential`] strategy and default parameters.
    ///
    /// The clock is the one read by the distributed generator.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let generator = Arc::new(DistributedIdGenerator::with_default_ids(clock.clone()));
        Self {
            clock,
            active: RwLock::new(ActiveStrategy {
                strategy: KeyStrategy::default(),
                params: KeyStrategyParams::default(),
                generator,
            }),
        }
    }

    /// Selects the active strategy and its parameters.
    ///
    /// Parameters are validated here and only here. The distributed generator is kept when
    /// worker and datacenter ids are unchanged, so that identifiers stay ordered across
    /// reconfigurations.
    pub fn configure(&self, strategy: KeyStrategy, params: KeyStrategyParams) -> SoftDelResult<()> {
        params.validate(strategy)?;

        let mut active = self.write()?;
        let generator = if active.generator.worker_id() == params.worker_id
            && active.generator.datacenter_id() == params.datacenter_id
        {
            active.generator.clone()
        } else {
            Arc::new(DistributedIdGenerator::with_clock(
                params.datacenter_id,
                params.worker_id,
                self.clock.clone(),
            )?)
        };

        tracing::info!(
            ?strategy,
            compact_length = params.compact_length,
            worker_id = params.worker_id,
            datacenter_id = params.datacenter_id,
            max_retries = params.max_retries,
            "configured key strategy"
        );
        *active = ActiveStrategy {
            strategy,
            params,
            generator,
        };

        Ok(())
    }

    /// Configures the registry from deserialized settings.
    pub fn configure_from_settings(&self, settings: &KeyStrategySettings) -> SoftDelResult<()> {
        self.configure(settings.strategy, settings.into())
    }

    /// Restores [`KeyStrategy::Sequential`] and the default parameters.
    pub fn reset(&self) -> SoftDelResult<()> {
        let mut active = self.write()?;
        *active = ActiveStrategy {
            strategy: KeyStrategy::default(),
            params: KeyStrategyParams::default(),
            generator: Arc::new(DistributedIdGenerator::with_default_ids(self.clock.clone())),
        };
        tracing::debug!("key strategy reset");

        Ok(())
    }

    /// Returns the active strategy.
    pub fn strategy(&self) -> SoftDelResult<KeyStrategy> {
        Ok(self.read()?.strategy)
    }

    /// Returns the strategy used for `table`: its own override or the active strategy.
    pub fn strategy_for(&self, table: &TableDef) -> SoftDelResult<KeyStrategy> {
        match table.key_strategy {
            Some(strategy) => Ok(strategy),
            None => self.strategy(),
        }
    }

    pub fn compact_length(&self) -> SoftDelResult<usize> {
        Ok(self.read()?.params.compact_length)
    }

    pub fn worker_id(&self) -> SoftDelResult<u8> {
        Ok(self.read()?.params.worker_id)
    }

    pub fn datacenter_id(&self) -> SoftDelResult<u8> {
        Ok(self.read()?.params.datacenter_id)
    }

    pub fn max_retries(&self) -> SoftDelResult<u32> {
        Ok(self.read()?.params.max_retries)
    }

    pub fn custom_generator(&self) -> SoftDelResult<Option<CustomGenerator>> {
        Ok(self.read()?.params.custom_generator.clone())
    }

    /// Returns the distributed generator.
    pub fn generator(&self) -> SoftDelResult<Arc<DistributedIdGenerator>> {
        Ok(self.read()?.generator.clone())
    }

    /// Checks that the primary key column of `table` can store the keys of its strategy.
    pub fn validate_table(&self, table: &TableDef) -> SoftDelResult<()> {
        let strategy = self.strategy_for(table)?;
        let pk = table
            .primary_key()
            .ok_or_else(|| ConfigError::MissingPrimaryKey(table.name.to_string()))?;

        if strategy == KeyStrategy::Custom && self.custom_generator()?.is_none() {
            return Err(ConfigError::MissingCustomGenerator.into());
        }
        if !strategy.accepts_column(pk.data_type, self.compact_length()?) {
            return Err(ConfigError::IncompatibleKeyColumn {
                table: table.name.to_string(),
                column: pk.name.to_string(),
                strategy,
            }
            .into());
        }

        Ok(())
    }

    /// Draws a key with `strategy`, without checking for collisions.
    ///
    /// Returns [`None`] for [`KeyStrategy::Sequential`], whose keys are allocated by the
    /// storage engine on insert.
    pub fn next_key(&self, strategy: KeyStrategy) -> SoftDelResult<Option<Value>> {
        let key = match strategy {
            KeyStrategy::Sequential => return Ok(None),
            KeyStrategy::FullIdentifier => Value::Text(Uuid::new_v4().hyphenated().to_string()),
            KeyStrategy::CompactIdentifier => {
                Value::Text(compact_identifier(self.compact_length()?))
            }
            KeyStrategy::Distributed => Value::Uint64(self.generator()?.generate()?),
            KeyStrategy::Custom => {
                let generator = self
                    .custom_generator()?
                    .ok_or(ConfigError::MissingCustomGenerator)?;
                generator()?
            }
        };

        Ok(Some(key))
    }

    /// Generates a primary key for a new row of `table`.
    ///
    /// Keys of collision prone strategies are checked against the existing rows of the table
    /// and drawn again on collision, up to the configured retry count.
    pub fn generate_key(
        &self,
        storage: &dyn Storage,
        table: &TableDef,
    ) -> SoftDelResult<Option<Value>> {
        let strategy = self.strategy_for(table)?;
        if !strategy.is_collision_prone() {
            return Ok(None);
        }

        let max_retries = self.max_retries()?;
        let key = generate_with_retry(
            storage,
            table.name,
            || {
                self.next_key(strategy)?.ok_or_else(|| {
                    GenerationError::Custom(format!("strategy {strategy:?} produced no key")).into()
                })
            },
            max_retries,
        )?;

        Ok(Some(key))
    }

    fn read(&self) -> SoftDelResult<RwLockReadGuard<'_, ActiveStrategy>> {
        self.active
            .read()
            .map_err(|_| SessionError::LockPoisoned.into())
    }

    fn write(&self) -> SoftDelResult<RwLockWriteGuard<'_, ActiveStrategy>> {
        self.active
            .write()
            .map_err(|_| SessionError::LockPoisoned.into())
    }
}

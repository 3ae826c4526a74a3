use softdel_api::prelude::{
    GenerationError, SoftDelError, SoftDelResult, Storage, StorageError, Value,
};

/// Draws keys from `generator` until one is not used by any row of `table`.
///
/// The existence check sees soft-deleted rows as well, since their storage rows still hold
/// the key. At most `max_retries` keys are drawn; if all of them collide a
/// [`GenerationError::Exhausted`] is returned.
///
/// If `table` does not exist yet, the first key is returned without any check.
pub fn generate_with_retry<F>(
    storage: &dyn Storage,
    table: &str,
    mut generator: F,
    max_retries: u32,
) -> SoftDelResult<Value>
where
    F: FnMut() -> SoftDelResult<Value>,
{
    for attempt in 1..=max_retries {
        let key = generator()?;
        match storage.exists(table, &key) {
            Ok(false) => return Ok(key),
            Ok(true) => {
                tracing::debug!(table, attempt, %key, "generated key collides with an existing row");
            }
            Err(SoftDelError::Storage(StorageError::TableNotFound(_))) => {
                tracing::warn!(table, %key, "table is not queryable; skipping collision check");
                return Ok(key);
            }
            Err(err) => return Err(err),
        }
    }

    tracing::error!(table, attempts = max_retries, "could not generate a unique key");
    Err(GenerationError::Exhausted {
        table: table.to_string(),
        attempts: max_retries,
    }
    .into())
}

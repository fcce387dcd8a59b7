//! Conflation: replay a checkpoint range into one change set

use crate::checkpoint::{Checkpoint, OLDEST_ORDINAL};
use crate::error::JournalError;
use crate::store::CheckpointStore;
use crate::Result;
use tracing::debug;

/// Fold every stored checkpoint from a starting ordinal through `through`
/// onto a copy of `base`
///
/// When `base` is already the same as `through`, it is returned without
/// touching the store. The range starts at `starting_with` when given,
/// otherwise at the base ordinal (never below 1). Ordinals missing on disk
/// are skipped, as are ordinals identical to the running result. The
/// in-memory `through` value stands in for its own ordinal.
pub fn conflate(
    store: &CheckpointStore,
    base: &Checkpoint,
    starting_with: Option<u32>,
    through: &Checkpoint,
) -> Result<Checkpoint> {
    let mut result = base.clone();
    if result.same_as(through) {
        return Ok(result);
    }

    let start = starting_with
        .filter(|&ordinal| ordinal >= OLDEST_ORDINAL)
        .unwrap_or_else(|| result.ordinal.max(OLDEST_ORDINAL));

    for ordinal in start..=through.ordinal {
        let loaded;
        let incoming = if ordinal == through.ordinal {
            through
        } else {
            match store.load(ordinal) {
                Ok(checkpoint) => {
                    loaded = checkpoint;
                    &loaded
                }
                Err(JournalError::NotFound { .. }) => {
                    debug!(ordinal, "Skipping missing checkpoint");
                    continue;
                }
                Err(e) => return Err(e),
            }
        };

        if incoming.same_as(&result) {
            continue;
        }
        result.absorb(incoming);
    }

    result.ordinal = result.ordinal.max(OLDEST_ORDINAL);
    debug!(
        from = start,
        through = through.ordinal,
        modifications = result.modifications.len(),
        deletions = result.deletions.len(),
        "Conflated checkpoints"
    );
    Ok(result)
}

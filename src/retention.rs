use crate::store::DatasetStore;
use log::{error, warn};
use std::fs;
use std::io::ErrorKind;

/// Enforce the per-owner retention window
///
/// After this call the owner has at most `keep` dataset records, the most
/// recently uploaded ones. Eviction works from a snapshot of the owner's
/// records taken at invocation time, so an upload racing with enforcement is
/// never at risk of eviction here; the next enforcement call will see it.
///
/// For each evicted record the backing file is removed first, then the
/// record itself. File removal is best effort: a missing file is not an
/// error, any other filesystem failure is logged and ignored. An
/// interrupted run can leave a
/// record whose file is already gone, which a retried enforcement cleans up.
///
/// # Arguments
/// * `store` - The dataset record store
/// * `owner` - Username whose history is pruned
/// * `keep` - How many records to retain
///
/// # Returns
/// * `usize` - Number of records evicted
pub fn enforce_retention(store: &DatasetStore, owner: &str, keep: usize) -> usize {
    let snapshot = store.list_for_owner(owner);
    let mut evicted = 0;

    for record in snapshot.into_iter().skip(keep) {
        if let Err(e) = fs::remove_file(&record.file) {
            if e.kind() != ErrorKind::NotFound {
                warn!(
                    "retention: failed to delete file {} for dataset {}: {}",
                    record.file.display(),
                    record.id,
                    e
                );
            }
        }

        match store.delete(record.id) {
            Ok(_) => evicted += 1,
            Err(e) => error!("retention: failed to delete dataset record {}: {}", record.id, e),
        }
    }

    evicted
}

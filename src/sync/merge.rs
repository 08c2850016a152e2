use super::{OptimisticEdit, Snapshot};

/// Renders `edits` on top of `snapshot`
///
/// Edits are applied in slice order to copies of their target documents. An
/// edit whose target is not in the snapshot has no effect. The input snapshot
/// is never modified and merging an already merged snapshot with the same
/// edits gives the same result.
pub fn merge(snapshot: &Snapshot, edits: &[OptimisticEdit]) -> Snapshot {
    if edits.is_empty() {
        return snapshot.clone();
    }

    let documents = snapshot
        .documents()
        .iter()
        .map(|doc| {
            let mut targeting = edits
                .iter()
                .filter(|edit| edit.target_key == doc.id)
                .peekable();
            if targeting.peek().is_none() {
                return doc.clone();
            }

            let mut copy = doc.clone();
            for edit in targeting {
                let value = edit.op.apply(copy.data.get(&edit.field));
                copy.data.insert(edit.field.clone(), value);
            }
            copy
        })
        .collect();

    Snapshot::new(documents)
}

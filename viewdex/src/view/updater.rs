//! Batched index updates for view groups.
//!
//! Updating any view indexes its whole group in one pass over the document
//! log, so sibling views sharing a design document never re-read the same
//! changes. `alone` opts a view out of dragging its siblings along.

use std::collections::BTreeMap;

use crate::collation::encode_row_value;
use crate::common::SequenceNumber;
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};
use crate::mapreduce::CompiledView;
use crate::store::{GroupStore, IndexTransaction, RowKey};
use crate::view::View;

/// Result of an index update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The index absorbed at least one change.
    Updated,
    /// Every requested view was already at the latest sequence.
    AlreadyCurrent,
}

/// Brings the given views up to date with their document log.
///
/// Views are batched per group; each group is indexed in one exclusive
/// transaction. With `alone` set, only the requested views are indexed;
/// otherwise every compiled, stale sibling in each group rides along.
///
/// Returns [`UpdateOutcome::AlreadyCurrent`] only when no group had any
/// work left, which includes the case where a concurrent updater finished
/// the work first.
pub fn update_indexes(views: &[View], alone: bool) -> ViewdexResult<UpdateOutcome> {
    let first = match views.first() {
        Some(view) => view,
        None => return Ok(UpdateOutcome::AlreadyCurrent),
    };
    let database = first.database()?;

    // A view with no compiled map function cannot be indexed.
    for view in views {
        view.compiled()?;
    }

    let mut by_group: BTreeMap<String, Vec<View>> = BTreeMap::new();
    for view in views {
        by_group
            .entry(view.group_name().to_string())
            .or_default()
            .push(view.clone());
    }

    let mut outcome = UpdateOutcome::AlreadyCurrent;
    for (group, requested) in by_group {
        let target = database.doc_store.latest_sequence()?;

        // Fast path: nothing to do, no transaction taken.
        if requested.iter().all(|view| view.checkpoint() >= target) {
            continue;
        }

        let siblings = if alone {
            Vec::new()
        } else {
            database.views_in_group(&group)
        };
        if update_group(&database, &requested, &siblings, target)? == UpdateOutcome::Updated {
            outcome = UpdateOutcome::Updated;
        }
    }
    Ok(outcome)
}

fn update_group(
    database: &crate::viewdex::ViewdexInner,
    requested: &[View],
    siblings: &[View],
    target: SequenceNumber,
) -> ViewdexResult<UpdateOutcome> {
    let store: &GroupStore = requested[0].store();
    let mut txn = store.transaction();

    // Re-check under the write lock: a concurrent updater we waited on may
    // have already indexed past the target.
    let current = |txn: &IndexTransaction<'_>, view: &View| {
        txn.meta(view.name()).map(|m| m.checkpoint).unwrap_or(0)
    };
    if requested.iter().all(|view| current(&txn, view) >= target) {
        return Ok(UpdateOutcome::AlreadyCurrent);
    }

    // Candidate set: the requested views plus any compiled, stale sibling.
    let mut candidates: Vec<(View, CompiledView, SequenceNumber)> = Vec::new();
    for view in requested {
        candidates.push((view.clone(), view.compiled()?, current(&txn, view)));
    }
    for sibling in siblings {
        if candidates
            .iter()
            .any(|(view, _, _)| view.name() == sibling.name())
        {
            continue;
        }
        let compiled = match sibling.compiled_opt() {
            Some(compiled) => compiled,
            None => continue,
        };
        let checkpoint = current(&txn, sibling);
        if checkpoint < target {
            candidates.push((sibling.clone(), compiled, checkpoint));
        }
    }

    let from = candidates
        .iter()
        .map(|(_, _, checkpoint)| *checkpoint)
        .min()
        .unwrap_or(0);

    let changes = database.doc_store.changes_since(from)?;
    let mut indexed = 0u64;
    for change in changes {
        let change = change.map_err(|err| {
            ViewdexError::new_with_cause(
                &format!("document change stream failed while indexing group '{}'", store.name()),
                ErrorKind::IndexError,
                err,
            )
        })?;
        // Changes committed after the target sequence belong to the next
        // update round.
        if change.sequence > target {
            break;
        }

        for (view, compiled, checkpoint) in &candidates {
            if *checkpoint >= change.sequence {
                continue;
            }
            txn.delete_doc_rows(view.name(), &change.doc_id);
            let body = match &change.body {
                Some(body) => body,
                None => continue,
            };
            let emissions = compiled.invoke_map(&change.doc_id, body).map_err(|err| {
                ViewdexError::new_with_cause(
                    &format!(
                        "map function of view '{}' failed on document '{}' (sequence {})",
                        view.name(),
                        change.doc_id,
                        change.sequence
                    ),
                    ErrorKind::IndexError,
                    err,
                )
            })?;
            let collation = view.collation();
            for (ordinal, emission) in emissions.into_iter().enumerate() {
                let encoded_key = collation.encode(&emission.key).map_err(|err| {
                    ViewdexError::new_with_cause(
                        &format!(
                            "view '{}' emitted an unencodable key for document '{}'",
                            view.name(),
                            change.doc_id
                        ),
                        ErrorKind::IndexError,
                        err,
                    )
                })?;
                let value = encode_row_value(emission.value.as_ref())?;
                let full_text = emission
                    .full_text
                    .map(|text| (ordinal as u64, text.into_bytes()));
                txn.insert_row(
                    view.name(),
                    RowKey::new(encoded_key, &change.doc_id, change.sequence),
                    value,
                    full_text,
                );
            }
        }
        indexed += 1;
    }

    for (view, _, _) in &candidates {
        txn.set_checkpoint(view.name(), target);
    }
    txn.commit();
    log::debug!(
        "indexed group '{}' to sequence {} ({} changes, {} views)",
        store.name(),
        target,
        indexed,
        candidates.len()
    );
    Ok(UpdateOutcome::Updated)
}

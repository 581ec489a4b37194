// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Keeps positional row keys pointing at the same records when the sorted
//! row model changes shape.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{RecordId, RowKey};

/// Pinned keys after the rows at `deleted` are removed. Deleted pins are
/// dropped and every surviving pin moves down once per deleted row above it.
/// Deletions are applied from the highest index down so earlier shifts
/// never disturb later indices.
pub fn pins_after_delete(pinned: &[RowKey], deleted: &BTreeSet<RowKey>) -> Vec<RowKey> {
    let mut next = pinned.to_vec();
    for removed in deleted.iter().rev() {
        next.retain(|key| key != removed);
        for key in &mut next {
            if *key > *removed {
                *key = RowKey::new(key.get() - 1);
            }
        }
    }
    next
}

/// Selection after the rows at `deleted` are removed, shifted like pins.
pub fn selection_after_delete(
    selection: &BTreeSet<RowKey>,
    deleted: &BTreeSet<RowKey>,
) -> BTreeSet<RowKey> {
    let ordered = selection.iter().copied().collect::<Vec<_>>();
    pins_after_delete(&ordered, deleted).into_iter().collect()
}

/// Flips every selected key in the pinned list: present keys are unpinned,
/// absent keys are appended in ascending key order.
pub fn toggle_pins(pinned: &[RowKey], selected: &BTreeSet<RowKey>) -> Vec<RowKey> {
    let mut next = pinned.to_vec();
    for key in selected {
        match next.iter().position(|pinned| pinned == key) {
            Some(index) => {
                next.remove(index);
            }
            None => next.push(*key),
        }
    }
    next
}

/// Moves keys from one sorted order to another by way of the records they
/// point at. Keys whose record is gone are dropped.
pub fn retarget_keys<I>(keys: I, before: &[RecordId], after: &[RecordId]) -> Vec<RowKey>
where
    I: IntoIterator<Item = RowKey>,
{
    let positions = after
        .iter()
        .enumerate()
        .map(|(index, id)| (id, RowKey::new(index)))
        .collect::<BTreeMap<_, _>>();
    keys.into_iter()
        .filter_map(|key| before.get(key.get()))
        .filter_map(|id| positions.get(id).copied())
        .collect()
}

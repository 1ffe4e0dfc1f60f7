//! Single-writer aggregation of check results into live state.

use super::{CheckResult, Event, TargetState};
use crate::db::Store;
use crate::snapshot::{Snapshot, SnapshotStore, TargetStatus};

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Run the aggregator loop until the result queue closes or shutdown fires.
///
/// This task is the only owner of per-target state; nothing else ever
/// mutates it, so the hot path needs no locking. Readers see state through
/// the snapshot store, which is replaced wholesale on every iteration.
pub async fn run_aggregator(
    mut results_rx: mpsc::Receiver<CheckResult>,
    events_tx: mpsc::Sender<Event>,
    store: Option<Arc<Store>>,
    snapshots: Arc<SnapshotStore>,
    mut stop: broadcast::Receiver<()>,
) {
    let mut state: HashMap<String, TargetState> = HashMap::new();

    loop {
        let res = tokio::select! {
            _ = stop.recv() => break,
            res = results_rx.recv() => match res {
                Some(res) => res,
                None => break,
            },
        };

        // Resolve state before persisting this result, so hydration reads
        // only prior history and never the row being written now.
        let st = match state.entry(res.target_name.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                // Hydrate once from history so streaks survive restarts.
                let loaded = store.as_ref().and_then(|s| {
                    s.load_target_state(&res.target_name).unwrap_or_else(|e| {
                        tracing::warn!(
                            "hydration for {} failed, starting fresh: {}",
                            res.target_name,
                            e
                        );
                        None
                    })
                });
                entry.insert(loaded.unwrap_or_else(|| TargetState::new(&res.target_name, &res.url)))
            }
        };

        // Best-effort persistence. A missed row never blocks live state.
        if let Some(store) = &store {
            if let Err(e) = store.insert_check_result(&res) {
                tracing::warn!("persist result for {} failed: {}", res.target_name, e);
            }
        }

        let prev_up = st.last_up;
        st.apply(&res);

        // The very first observation has no prior state to transition from.
        if st.total_checks > 1 && prev_up != res.up {
            let event = Event {
                target_name: res.target_name.clone(),
                url: res.url.clone(),
                from: prev_up,
                to: res.up,
                at: res.at,
                reason: res.reason().unwrap_or_default().to_string(),
                status_code: res.status_code,
            };

            tokio::select! {
                _ = stop.recv() => {}
                _ = events_tx.send(event) => {}
            }
        }

        snapshots.publish(build_snapshot(&state));
    }
}

fn build_snapshot(states: &HashMap<String, TargetState>) -> Snapshot {
    let mut all: Vec<TargetStatus> = states.values().map(TargetStatus::from).collect();
    all.sort_by(|a, b| a.name.cmp(&b.name));

    let by_name = all
        .iter()
        .map(|dto| (dto.name.clone(), dto.clone()))
        .collect();

    Snapshot { all, by_name }
}

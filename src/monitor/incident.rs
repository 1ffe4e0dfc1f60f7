//! Incident lifecycle tracking driven by transition events.

use super::Event;
use crate::db::Store;
use crate::notify::{format_event_message, WebhookNotifier};

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Consume transition events and maintain incident rows.
///
/// A down-transition opens an incident unless one is already open; an
/// up-transition closes the open incident, or does nothing. Both sides are
/// enforced at the store, so repeated events of the same kind are no-ops.
/// Persistence and notification failures are logged and never stop the loop.
pub async fn run_incident_tracker(
    mut events_rx: mpsc::Receiver<Event>,
    store: Option<Arc<Store>>,
    notifier: Option<WebhookNotifier>,
    mut stop: broadcast::Receiver<()>,
) {
    loop {
        let ev = tokio::select! {
            _ = stop.recv() => break,
            ev = events_rx.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
        };

        if let Some(store) = &store {
            let persisted = if ev.to {
                store.close_incident(&ev)
            } else {
                store.open_incident(&ev)
            };
            if let Err(e) = persisted {
                tracing::error!("incident persist failed for {}: {}", ev.target_name, e);
            }
        }

        if let Some(notifier) = &notifier {
            let msg = format_event_message(&ev);
            if let Err(e) = notifier.notify(&msg).await {
                tracing::warn!("notification failed for {}: {}", ev.target_name, e);
            }
        }
    }
}

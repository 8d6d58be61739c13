//! Note sync for a bounding box.

use osmsync::tile::Extent;
use osmsync::ServiceEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use super::common::Session;
use crate::error::CliError;

pub async fn run(session: &Session, bbox: &Extent, json: bool) -> Result<(), CliError> {
    let service = &session.service;
    session.sign_in().await?;

    let mut events = service.subscribe();
    let issued = service.load_notes(bbox)?;
    info!(tiles = issued, "Syncing notes");

    wait_until_idle(&mut events, || {
        service.with_caches(|c| c.note.inflight.is_empty())
    })
    .await;

    let mut notes = service.notes_in(bbox);
    notes.sort_by_key(|n| n.id);

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }

    for note in &notes {
        let status = note.status().map(|s| s.as_str()).unwrap_or("unknown");
        let text = note
            .comments
            .first()
            .and_then(|c| c.get("text"))
            .map(String::as_str)
            .unwrap_or("");
        println!(
            "#{} [{}] {:.5},{:.5} {}",
            note.id, status, note.loc[1], note.loc[0], text
        );
    }
    println!();
    println!("{} notes", notes.len());
    Ok(())
}

/// Waits on service events until `idle` holds.
///
/// Lagged receivers are fine: idleness is read from the caches, not counted
/// from events.
async fn wait_until_idle(
    events: &mut broadcast::Receiver<ServiceEvent>,
    idle: impl Fn() -> bool,
) {
    while !idle() {
        match events.recv().await {
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Note events lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_survives_lagged_events() {
        let (tx, mut rx) = broadcast::channel(2);
        for _ in 0..5 {
            tx.send(ServiceEvent::LoadedNotes).unwrap();
        }

        // Busy on the first check, idle once the lag has been reported.
        let checks = AtomicUsize::new(0);
        wait_until_idle(&mut rx, || checks.fetch_add(1, Ordering::SeqCst) > 0).await;
        assert_eq!(checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wait_returns_once_idle_after_event() {
        let (tx, mut rx) = broadcast::channel(4);
        let idle = Arc::new(AtomicBool::new(false));

        let flag = idle.clone();
        let waiter = tokio::spawn(async move {
            wait_until_idle(&mut rx, move || flag.load(Ordering::SeqCst)).await;
        });
        tokio::task::yield_now().await;

        idle.store(true, Ordering::SeqCst);
        tx.send(ServiceEvent::LoadedNotes).unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_stops_when_service_is_gone() {
        let (tx, mut rx) = broadcast::channel::<ServiceEvent>(4);
        drop(tx);
        wait_until_idle(&mut rx, || false).await;
    }
}

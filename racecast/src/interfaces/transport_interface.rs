use crate::error::TrackerError;
use crate::post::events::{Event, RaceSetupPayload};
use flume::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

pub const EVENT_QUEUE_CAPACITY: usize = 50;

/// Outbound is an item of the event queue. `Closed` is pushed once when the broadcast ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Batch(Vec<Event>),
    Closed,
}

type SharedRace = Arc<RwLock<Option<Arc<RaceSetupPayload>>>>;

/// EventQueue is the producer side used by the broadcast loop. Sending blocks while the queue
/// is full.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: Sender<Outbound>,
    latest_race: SharedRace,
}

/// TransportHandle is the consumer side given to the transport layer.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    pub rx: Receiver<Outbound>,
    latest_race: SharedRace,
}

/// event_queue creates a bounded event queue and the matching consumer handle.
pub fn event_queue(capacity: usize) -> (EventQueue, TransportHandle) {
    let (tx, rx) = flume::bounded(capacity);
    let latest_race: SharedRace = Arc::new(RwLock::new(None));

    (
        EventQueue {
            tx,
            latest_race: Arc::clone(&latest_race),
        },
        TransportHandle { rx, latest_race },
    )
}

impl EventQueue {
    pub fn send_batch(&self, batch: Vec<Event>) -> Result<(), TrackerError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Outbound::Batch(batch))
            .map_err(|_| TrackerError::QueueClosed)
    }

    /// The method pushes the terminal marker. A consumer that already left is ignored.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Closed);
    }

    /// The method replaces the race view served to consumers joining late.
    pub fn publish_race(&self, race: RaceSetupPayload) {
        if let Ok(mut latest) = self.latest_race.write() {
            *latest = Some(Arc::new(race));
        }
    }
}

impl TransportHandle {
    /// The method returns the last published race view, if any.
    pub fn latest_race(&self) -> Option<Arc<RaceSetupPayload>> {
        self.latest_race
            .read()
            .ok()
            .and_then(|latest| latest.as_ref().map(Arc::clone))
    }
}

/// StopToken asks the broadcast loop to stop at the end of its current cycle.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> StopToken {
        StopToken::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::events::{TeamEndPayload, TeamStartPayload};
    use chrono::NaiveTime;

    fn end_event(bib_number: u32) -> Event {
        Event::TeamEnd(TeamEndPayload {
            bib_number,
            total_time: 100,
            average_pace: 250.0,
        })
    }

    #[test]
    fn test_batches_keep_order_and_close_marker_comes_last() {
        let (queue, handle) = event_queue(4);
        queue.send_batch(vec![end_event(1), end_event(2)]).unwrap();
        queue
            .send_batch(vec![Event::TeamStart(TeamStartPayload {
                bib_number: 3,
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            })])
            .unwrap();
        queue.close();

        assert_eq!(
            handle.rx.recv().unwrap(),
            Outbound::Batch(vec![end_event(1), end_event(2)])
        );
        assert!(matches!(handle.rx.recv().unwrap(), Outbound::Batch(_)));
        assert_eq!(handle.rx.recv().unwrap(), Outbound::Closed);
    }

    #[test]
    fn test_empty_batches_are_not_queued() {
        let (queue, handle) = event_queue(1);
        queue.send_batch(Vec::new()).unwrap();
        assert!(handle.rx.try_recv().is_err());
    }

    #[test]
    fn test_send_fails_without_consumer() {
        let (queue, handle) = event_queue(1);
        drop(handle);
        assert!(matches!(
            queue.send_batch(vec![end_event(1)]),
            Err(TrackerError::QueueClosed)
        ));
        queue.close();
    }

    #[test]
    fn test_full_queue_blocks_producer() {
        let (queue, handle) = event_queue(1);
        queue.send_batch(vec![end_event(1)]).unwrap();

        let producer = std::thread::spawn(move || queue.send_batch(vec![end_event(2)]));
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!producer.is_finished());

        handle.rx.recv().unwrap();
        producer.join().unwrap().unwrap();
        assert_eq!(handle.rx.recv().unwrap(), Outbound::Batch(vec![end_event(2)]));
    }

    #[test]
    fn test_stop_token_is_shared() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!token.is_stopped());
        clone.stop();
        assert!(token.is_stopped());
    }
}

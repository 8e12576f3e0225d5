#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use courier_amqp_memory::{Error, MemoryBroker, MemoryChannel};
use courier_publisher::{Detach, ErrorState, Owner, Publisher, PublisherId};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Owner that records everything the publisher tells it.
#[derive(Debug, Default)]
pub struct RecordingOwner {
    pub reported: Mutex<Vec<Error>>,
    pub forgotten: Mutex<Vec<PublisherId>>,
}

impl Owner<Error> for RecordingOwner {
    fn report_error(&self, error: Error) {
        self.reported.lock().push(error);
    }

    fn forget(&self, publisher: PublisherId) {
        self.forgotten.lock().push(publisher);
    }
}

pub const RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Keeps the publisher supplied with channels the way a connection owner
/// would. Returns the number of channels handed to the publisher.
pub fn supervise(
    broker: &MemoryBroker,
    publisher: &Publisher<MemoryChannel>,
    owner: &Arc<RecordingOwner>,
) -> JoinHandle<usize> {
    let broker = broker.clone();
    let publisher = publisher.clone();
    let owner = owner.clone();

    tokio::spawn(async move {
        let mut attachments = 0;

        while !publisher.is_dead() {
            let channel = match broker.open_channel() {
                Ok(channel) => channel,
                Err(e) => {
                    owner.report_error(e);
                    sleep(RETRY_INTERVAL).await;
                    continue;
                }
            };

            attachments += 1;
            match publisher.serve(owner.as_ref(), channel).await {
                Detach::Cancelled | Detach::AlreadyAttached => break,
                Detach::Closed(_) => sleep(RETRY_INTERVAL).await,
            }
        }

        attachments
    })
}

/// Polls until `predicate` holds for the publisher's error state.
pub async fn wait_for_state(
    publisher: &Publisher<MemoryChannel>,
    predicate: impl Fn(&ErrorState<Error>) -> bool,
) {
    timeout(Duration::from_secs(1), async {
        while !predicate(publisher.error_state().as_ref()) {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("publisher never reached the expected state");
}

pub async fn wait_attached(publisher: &Publisher<MemoryChannel>) {
    timeout(Duration::from_secs(1), async {
        while !(publisher.is_attached()
            && matches!(*publisher.error_state(), ErrorState::NoError))
        {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("publisher was never attached");
}

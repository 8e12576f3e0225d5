mod common;

use common::{RecordingOwner, supervise, wait_attached, wait_for_state};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use bytes::Bytes;
use courier_amqp::Publishing;
use courier_amqp_memory::{Error as MemoryError, MemoryBroker, MemoryChannel};
use courier_publisher::{Detach, Error, ErrorState, Publisher, PublisherOptions};
use futures::future::join_all;
use tokio::time::timeout;
use tracing_test::traced_test;

fn orders_publisher() -> (MemoryBroker, Publisher<MemoryChannel>, Arc<RecordingOwner>) {
    let broker = MemoryBroker::new();
    broker.declare_exchange("orders");
    let publisher = Publisher::new(PublisherOptions::new("orders", "new"));

    (broker, publisher, Arc::new(RecordingOwner::default()))
}

#[tokio::test]
#[traced_test]
async fn test_publisher_lifecycle() {
    let (broker, publisher, owner) = orders_publisher();

    assert_matches!(
        publisher.publish(Publishing::new("early")).await,
        Err(Error::NotInitialized)
    );

    let channel = broker.open_channel().unwrap();
    let serving = tokio::spawn({
        let publisher = publisher.clone();
        let owner = owner.clone();
        let channel = channel.clone();
        async move { publisher.serve(owner.as_ref(), channel).await }
    });
    wait_attached(&publisher).await;

    publisher.publish(Publishing::new("x")).await.unwrap();

    let published = broker.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].exchange, "orders");
    assert_eq!(published[0].routing_key, "new");
    assert_eq!(published[0].publishing.body, Bytes::from("x"));

    channel.terminate(Some(MemoryError::connection_forced("E1")));
    assert_matches!(serving.await.unwrap(), Detach::Closed(Some(_)));

    for _ in 0..3 {
        assert_matches!(
            publisher.publish(Publishing::new("y")).await,
            Err(Error::Channel(e)) if e.reason == "E1"
        );
    }

    assert!(publisher.cancel());

    assert_matches!(
        publisher.publish(Publishing::new("z")).await,
        Err(Error::Dead)
    );
    assert_eq!(broker.published().len(), 1);
}

#[tokio::test]
async fn test_concurrent_publishes_get_their_own_replies() {
    let (broker, publisher, owner) = orders_publisher();
    let supervisor = supervise(&broker, &publisher, &owner);
    wait_attached(&publisher).await;

    broker.reject_next(MemoryError::precondition_failed("quota"));

    let results = join_all((0..32).map(|i| {
        let publisher = publisher.clone();
        async move {
            publisher
                .publish_with_routing_key(
                    Publishing::new(format!("body-{i}")),
                    format!("key-{i}"),
                )
                .await
        }
    }))
    .await;

    let rejected = results
        .iter()
        .filter(|result| {
            matches!(
                result,
                Err(Error::Publish(e)) if e.code == MemoryError::PRECONDITION_FAILED
            )
        })
        .count();
    let accepted = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(rejected, 1);
    assert_eq!(accepted, 31);

    // Every accepted message went out exactly once under its own key
    let published = broker.published();
    assert_eq!(published.len(), 31);
    let keys: HashSet<_> = published
        .iter()
        .map(|delivery| {
            let index = delivery.routing_key.trim_start_matches("key-");
            assert_eq!(delivery.publishing.body, Bytes::from(format!("body-{index}")));
            delivery.routing_key.clone()
        })
        .collect();
    assert_eq!(keys.len(), 31);

    // A rejected publish is not a channel failure
    assert_matches!(*publisher.error_state(), ErrorState::NoError);

    publisher.cancel();
    assert_eq!(supervisor.await.unwrap(), 1);
}

#[tokio::test]
#[traced_test]
async fn test_recovers_after_broker_outage() {
    let (broker, publisher, owner) = orders_publisher();
    let supervisor = supervise(&broker, &publisher, &owner);
    wait_attached(&publisher).await;

    publisher.publish(Publishing::new("before")).await.unwrap();

    broker.disconnect(MemoryError::connection_forced("node restart"));
    wait_for_state(&publisher, |state| matches!(state, ErrorState::Error(_))).await;

    assert_matches!(
        publisher.publish(Publishing::new("during")).await,
        Err(Error::Channel(e)) if e.code == MemoryError::CONNECTION_FORCED
    );

    // Reopen attempts fail and are surfaced to the owner
    timeout(Duration::from_secs(1), async {
        while owner.reported.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    broker.restore();
    wait_attached(&publisher).await;

    publisher.publish(Publishing::new("after")).await.unwrap();

    let bodies: Vec<_> = broker
        .published()
        .into_iter()
        .map(|delivery| delivery.publishing.body)
        .collect();
    assert_eq!(bodies, vec![Bytes::from("before"), Bytes::from("after")]);
    assert!(
        owner
            .reported
            .lock()
            .iter()
            .all(|e| e.code == MemoryError::CONNECTION_FORCED)
    );

    publisher.cancel();
    assert_eq!(supervisor.await.unwrap(), 2);
    assert_eq!(*owner.forgotten.lock(), vec![publisher.id()]);
}

#[tokio::test]
async fn test_missing_exchange_surfaces_as_channel_error() {
    let broker = MemoryBroker::new();
    let owner = Arc::new(RecordingOwner::default());
    let publisher: Publisher<MemoryChannel> =
        Publisher::new(PublisherOptions::new("missing", "key"));

    let channel = broker.open_channel().unwrap();
    let serving = tokio::spawn({
        let publisher = publisher.clone();
        let owner = owner.clone();
        async move { publisher.serve(owner.as_ref(), channel).await }
    });
    wait_attached(&publisher).await;

    // The broker accepts the frame and then closes the channel
    publisher.publish(Publishing::new("x")).await.unwrap();

    assert_matches!(
        serving.await.unwrap(),
        Detach::Closed(Some(e)) if e.code == MemoryError::NOT_FOUND
    );
    assert_matches!(
        publisher.publish(Publishing::new("y")).await,
        Err(Error::Channel(e)) if e.code == MemoryError::NOT_FOUND
    );
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn test_cancel_releases_callers_during_outage() {
    let (broker, publisher, owner) = orders_publisher();
    let channel = broker.open_channel().unwrap();
    let serving = tokio::spawn({
        let publisher = publisher.clone();
        let owner = owner.clone();
        let channel = channel.clone();
        async move { publisher.serve(owner.as_ref(), channel).await }
    });
    wait_attached(&publisher).await;

    // Graceful close leaves no sticky error, so callers wait for a channel
    channel.terminate(None);
    assert_matches!(serving.await.unwrap(), Detach::Closed(None));

    let pending: Vec<_> = (0..8)
        .map(|i| {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.write(format!("line {i}")).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(pending.iter().all(|handle| !handle.is_finished()));

    assert!(publisher.cancel());

    for handle in pending {
        assert_matches!(
            timeout(Duration::from_secs(1), handle).await.unwrap().unwrap(),
            Err(Error::Dead)
        );
    }
    assert!(broker.published().is_empty());

    // Nothing is served once dead
    let detach = publisher
        .serve(owner.as_ref(), broker.open_channel().unwrap())
        .await;
    assert_matches!(detach, Detach::Cancelled);
}

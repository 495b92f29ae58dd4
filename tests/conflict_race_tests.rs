mod common;

use agrirent::domain::actor::Actor;
use agrirent::domain::booking::BookingStatus;
use agrirent::domain::ports::BookingStore;
use agrirent::domain::{BookingId, UserId};
use agrirent::error::BookingError;
use common::{harness, request, OWNER};
use rand::Rng;

#[tokio::test]
async fn test_concurrent_approvals_have_a_single_winner() {
    let h = harness().await;

    // Eight renters all want the same three days; pending requests are
    // allowed to stack up.
    for id in 1..=8u64 {
        h.engine
            .create(Actor::renter(UserId(100 + id)), request(id, 10, 13))
            .await
            .unwrap();
    }

    // The owner's tabs race to approve them all at once.
    let mut tasks = Vec::new();
    for id in 1..=8u64 {
        let engine = h.engine.clone();
        tasks.push(tokio::spawn(async move {
            engine.approve(BookingId(id), Actor::owner(OWNER), None).await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let approved = h
        .store
        .all()
        .await
        .unwrap()
        .into_iter()
        .filter(|b| b.status == BookingStatus::Approved)
        .count();
    assert_eq!(approved, 1);
}

#[tokio::test]
async fn test_losing_approval_reports_conflict_and_stays_pending() {
    let h = harness().await;
    h.engine
        .create(Actor::renter(UserId(101)), request(1, 10, 13))
        .await
        .unwrap();
    h.engine
        .create(Actor::renter(UserId(102)), request(2, 12, 15))
        .await
        .unwrap();

    h.engine
        .approve(BookingId(1), Actor::owner(OWNER), None)
        .await
        .unwrap();
    let err = h
        .engine
        .approve(BookingId(2), Actor::owner(OWNER), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict(_)));
    assert_eq!(
        h.store.get(BookingId(2)).await.unwrap().unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn test_touching_date_ranges_conflict() {
    let h = harness().await;
    h.engine
        .create(Actor::renter(UserId(101)), request(1, 10, 12))
        .await
        .unwrap();
    h.engine
        .approve(BookingId(1), Actor::owner(OWNER), None)
        .await
        .unwrap();

    // Starting exactly when the approved rental ends still conflicts;
    // bounds are inclusive on both sides.
    let err = h
        .engine
        .create(Actor::renter(UserId(102)), request(2, 12, 14))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict(_)));
}

#[tokio::test]
async fn test_random_approvals_never_double_book() {
    let h = harness().await;
    let mut rng = rand::thread_rng();

    let mut created = Vec::new();
    for id in 1..=40u64 {
        let from = rng.gen_range(1..=25u32);
        let to = from + rng.gen_range(1..=4u32);
        h.engine
            .create(Actor::renter(UserId(100 + id)), request(id, from, to))
            .await
            .unwrap();
        created.push(id);
    }
    for id in created {
        // Conflicting approvals are expected; losing requests stay pending.
        let _ = h.engine.approve(BookingId(id), Actor::owner(OWNER), None).await;
    }

    let approved: Vec<_> = h
        .store
        .all()
        .await
        .unwrap()
        .into_iter()
        .filter(|b| b.status == BookingStatus::Approved)
        .collect();
    assert!(!approved.is_empty());
    for (i, a) in approved.iter().enumerate() {
        for b in &approved[i + 1..] {
            assert!(
                !a.interval.overlaps(&b.interval),
                "bookings {} and {} are both approved over overlapping dates",
                a.id,
                b.id
            );
        }
    }
}

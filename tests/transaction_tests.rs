//! End-to-end tests for the delivery transaction protocol, driven through
//! the in-memory backend.

use std::time::Duration;

use handoff::{
    Body, DeliveryError, DeliveryTarget, Fabricator, FabricatorConfig, Header, HeaderPreamble,
    MemoryTarget, MsgMetadata, MultiStatus,
};
use pretty_assertions::assert_eq;

fn fabricator() -> Fabricator {
    Fabricator::new(
        HeaderPreamble::default(),
        FabricatorConfig {
            body_size: 100 * 1024,
            extra_header_fields: 20,
            extra_header_field_size: 100,
        },
    )
}

#[tokio::test]
async fn full_transaction_reaches_exactly_one_terminal_state() {
    let target = MemoryTarget::new();
    let (meta, header, body) = fabricator().build("full-transaction");
    assert_eq!(header.len(), 29);
    assert_eq!(body.len(), 100 * 1024);

    let mut delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");

    let recipients = [
        "b1@example.org",
        "b2@example.org",
        "b3@example.org",
        "b4@example.org",
        "b5@example.org",
    ];
    for rcpt in recipients {
        delivery.add_rcpt(rcpt).await.expect("recipient accepted");
    }

    delivery.body(&header, &body).await.expect("body accepted");
    delivery.commit().await.expect("commit succeeds");

    // Committed: the terminal state was reached once and resources released.
    assert_eq!(target.active_transactions(), 0);
    assert_eq!(target.delivered_count(), recipients.len());
    for rcpt in recipients {
        let mailbox = target.mailbox(rcpt);
        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox[0].metadata, meta);
        assert_eq!(mailbox[0].body.len(), 100 * 1024);
    }
}

#[tokio::test]
async fn abort_after_any_prefix_never_errors_and_releases() {
    let target = MemoryTarget::new();
    let (meta, header, body) = fabricator().build("abort-prefixes");

    // Immediately after start.
    let delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");
    delivery.abort().await;
    assert_eq!(target.active_transactions(), 0);

    // After partial recipient addition.
    let mut delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");
    delivery.add_rcpt("b1@example.org").await.expect("rcpt");
    delivery.abort().await;
    assert_eq!(target.active_transactions(), 0);

    // After a successful body, before commit.
    let mut delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");
    delivery.add_rcpt("b1@example.org").await.expect("rcpt");
    delivery.body(&header, &body).await.expect("body");
    delivery.abort().await;
    assert_eq!(target.active_transactions(), 0);
    assert_eq!(target.delivered_count(), 0);
}

#[tokio::test]
async fn rejected_recipient_does_not_invalidate_transaction() {
    let target = MemoryTarget::new();
    let (meta, _, _) = fabricator().build("rejected-recipient");

    let mut delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");

    let err = delivery
        .add_rcpt("not-an-address")
        .await
        .expect_err("malformed domain should be rejected");
    assert!(matches!(err, DeliveryError::RecipientRejected(_)));

    // Transaction still usable for subsequent valid recipients.
    delivery
        .add_rcpt("b1@example.org")
        .await
        .expect("valid recipient still accepted");

    // And abort still succeeds afterwards.
    delivery.abort().await;
    assert_eq!(target.active_transactions(), 0);
}

#[tokio::test]
async fn non_atomic_submission_reports_every_recipient_exactly_once() {
    let target = MemoryTarget::new();
    let (meta, header, body) = fabricator().build("non-atomic-all");

    let recipients: Vec<String> = (0..7).map(|i| format!("rcpt-{i}@example.org")).collect();

    let mut delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");
    for rcpt in &recipients {
        delivery.add_rcpt(rcpt).await.expect("rcpt");
    }

    let mut status = MultiStatus::new();
    let partial = delivery
        .partial()
        .expect("memory backend supports non-atomic submission");
    partial.body_non_atomic(&mut status, &header, &body).await;

    // Exactly N outcomes, no duplicate or missing recipient keys.
    assert_eq!(status.len(), recipients.len());
    for rcpt in &recipients {
        assert!(status.is_delivered(rcpt), "missing outcome for {rcpt}");
    }

    delivery.abort().await;
}

#[tokio::test]
async fn non_atomic_failure_is_isolated_to_one_recipient() {
    let target = MemoryTarget::new();
    let (meta, header, body) = fabricator().build("non-atomic-partial");

    let mut delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");
    for rcpt in ["r1@example.org", "r2@example.org", "r3@example.org"] {
        delivery.add_rcpt(rcpt).await.expect("rcpt");
    }

    // Accepted at RCPT time, denied at body time: policy changed mid-flight.
    target.reject_recipient("r2@example.org");

    let mut status = MultiStatus::new();
    let partial = delivery
        .partial()
        .expect("memory backend supports non-atomic submission");
    partial.body_non_atomic(&mut status, &header, &body).await;

    assert_eq!(status.len(), 3);
    assert!(status.is_delivered("r1@example.org"));
    assert!(status.is_delivered("r3@example.org"));
    assert!(matches!(
        status.get("r2@example.org"),
        Some(Err(DeliveryError::RecipientRejected(_)))
    ));

    delivery.commit().await.expect("commit");
    assert_eq!(target.delivered_count(), 2);
}

#[tokio::test]
async fn one_envelope_reused_across_many_transactions() {
    let target = MemoryTarget::new();
    let (meta, header, body) = fabricator().build("reuse");

    // The memory backend declares idempotent body submission: reusing one
    // fabricated header/body pair must produce identical outcomes each time.
    for round in 0..10 {
        let mut delivery = target
            .start(&meta, "a@example.org")
            .await
            .expect("start should succeed");
        delivery.add_rcpt("b@example.org").await.expect("rcpt");
        delivery.body(&header, &body).await.expect("body");
        delivery.commit().await.expect("commit");

        assert_eq!(target.delivered_count(), round + 1);
    }

    let mailbox = target.mailbox("b@example.org");
    assert_eq!(mailbox.len(), 10);
    for stored in &mailbox {
        assert_eq!(stored.header, header);
        assert_eq!(stored.body.as_bytes(), body.as_bytes());
    }
}

#[tokio::test]
async fn failed_body_leaves_transaction_abortable() {
    let target = MemoryTarget::new();
    target.reject_recipient("late@example.org");
    let (meta, header, body) = fabricator().build("failed-body");

    let mut delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");
    delivery.add_rcpt("ok@example.org").await.expect("rcpt");

    // Accepted at RCPT time, denied at body time: policy changed mid-flight.
    let target_handle = target.clone();
    target_handle.reject_recipient("ok@example.org");

    let err = delivery
        .body(&header, &body)
        .await
        .expect_err("atomic body fails for all recipients");
    assert!(err.is_fatal());

    delivery.abort().await;
    assert_eq!(target.active_transactions(), 0);
    assert_eq!(target.delivered_count(), 0);
}

#[tokio::test]
async fn concurrent_transactions_do_not_share_state() {
    let target = MemoryTarget::new();
    let fabricator = fabricator();

    let mut handles = Vec::new();
    for i in 0..20 {
        let target = target.clone();
        let (meta, header, body) = fabricator.build(&format!("concurrent-{i}"));
        handles.push(tokio::spawn(async move {
            let mut delivery = target.start(&meta, "a@example.org").await?;
            delivery.add_rcpt(&format!("rcpt-{i}@example.org")).await?;
            delivery.body(&header, &body).await?;
            delivery.commit().await
        }));
    }

    target
        .wait_for_delivered(20, Duration::from_secs(5))
        .await
        .expect("all commits observed before the timeout");

    for handle in handles {
        handle
            .await
            .expect("task panicked")
            .expect("transaction succeeded");
    }

    assert_eq!(target.active_transactions(), 0);
    assert_eq!(target.delivered_count(), 20);
    for i in 0..20 {
        let mailbox = target.mailbox(&format!("rcpt-{i}@example.org"));
        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox[0].metadata, MsgMetadata::synthetic(&format!("concurrent-{i}")));
    }
}

#[tokio::test]
async fn commit_failure_must_not_be_mistaken_for_delivery() {
    let target = MemoryTarget::new();
    target.induce_commit_failure(true);
    let (meta, _, _) = fabricator().build("commit-failure");

    let mut delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");
    delivery.add_rcpt("b@example.org").await.expect("rcpt");
    delivery
        .body(&Header::new(), &Body::filler(64))
        .await
        .expect("body");

    let err = delivery.commit().await.expect_err("commit fails");
    assert!(matches!(err, DeliveryError::Commit(_)));
    assert_eq!(target.delivered_count(), 0);
    assert_eq!(target.active_transactions(), 0);

    // Backend recovers once the fault clears.
    target.induce_commit_failure(false);
    let mut delivery = target
        .start(&meta, "a@example.org")
        .await
        .expect("start should succeed");
    delivery.add_rcpt("b@example.org").await.expect("rcpt");
    delivery
        .body(&Header::new(), &Body::filler(64))
        .await
        .expect("body");
    delivery.commit().await.expect("commit succeeds");
    assert_eq!(target.delivered_count(), 1);
}

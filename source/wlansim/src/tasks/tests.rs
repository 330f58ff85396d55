use super::*;
use crate::{
    config::TxFullPolicy,
    doorbell::Ring,
    packet::Packet,
    power::PowerState,
    test_util::{self, push_tx, rx_sequences},
    SimError,
};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn masked_completion_is_dropped_not_deferred() {
    let ctx = test_util::context(test_util::settings());
    let mut fw = Firmware::new(ctx.clone());
    let mut bh = BottomHalf::new(ctx.clone());

    push_tx(&ctx, 0).await;
    let masked = ctx.irq().mask();
    assert_eq!(fw.step().await, Ok(FwStep::Processed { seq: 0 }));
    drop(masked);

    // The ACK made it into the RX ring, but nobody was told.
    assert_eq!(rx_sequences(&ctx).await, vec![0]);
    assert!(!ctx.doorbell().is_pending());
    assert_eq!(ctx.stats().snapshot().doorbell_masked, 1);
    assert!(tokio::time::timeout(Duration::from_secs(1), bh.step())
        .await
        .is_err());

    // Unmasking doesn't replay it; only the next completion's ring does.
    push_tx(&ctx, 1).await;
    assert_eq!(fw.step().await, Ok(FwStep::Processed { seq: 1 }));
    assert_eq!(bh.step().await, Ok(BhStep::Retired { seq: 0 }));
    assert_eq!(rx_sequences(&ctx).await, vec![1]);
}

#[tokio::test(start_paused = true)]
async fn coalesced_rings_strand_acks() {
    let ctx = test_util::context(test_util::settings());
    let mut fw = Firmware::new(ctx.clone());
    let mut bh = BottomHalf::new(ctx.clone());

    push_tx(&ctx, 0).await;
    push_tx(&ctx, 1).await;
    fw.step().await.unwrap();
    fw.step().await.unwrap();

    let stats = ctx.stats().snapshot();
    assert_eq!(stats.doorbell_delivered, 1);
    assert_eq!(stats.doorbell_coalesced, 1);

    // Two completions, one wake, one ACK retired.
    assert_eq!(bh.step().await, Ok(BhStep::Retired { seq: 0 }));
    assert!(!ctx.doorbell().is_pending());
    assert_eq!(rx_sequences(&ctx).await, vec![1]);
    assert!(tokio::time::timeout(Duration::from_secs(1), bh.step())
        .await
        .is_err());

    // A later, unrelated ring picks up the stranded ACK first.
    push_tx(&ctx, 2).await;
    fw.step().await.unwrap();
    assert_eq!(bh.step().await, Ok(BhStep::Retired { seq: 1 }));
    assert_eq!(rx_sequences(&ctx).await, vec![2]);
    assert!(!ctx.irq().is_masked());
    assert_eq!(ctx.stats().retired(), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn empty_wake_unmasks() {
    let ctx = test_util::context(test_util::settings());
    let mut bh = BottomHalf::new(ctx.clone());

    assert_eq!(ctx.doorbell().ring(), Ring::Delivered);
    assert_eq!(bh.step().await, Ok(BhStep::Empty));
    assert!(!ctx.irq().is_masked());

    let stats = ctx.stats().snapshot();
    assert_eq!(stats.bh_wakes, 1);
    assert_eq!(stats.empty_wakes, 1);
    assert_eq!(stats.acks_retired, 0);
}

#[tokio::test(start_paused = true)]
async fn tx_lock_not_held_while_processing() {
    let ctx = test_util::context(test_util::settings());
    push_tx(&ctx, 0).await;

    let processing = tokio::spawn({
        let ctx = ctx.clone();
        async move { Firmware::new(ctx).step().await }
    });
    for _ in 0..16 {
        if ctx.stats().snapshot().fw_processed == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(ctx.stats().snapshot().fw_processed, 1);
    assert_eq!(ctx.clock().now(), 0, "firmware should still be processing");

    // The driver can keep producing while the firmware works.
    assert!(ctx.tx_ring().try_lock().is_ok());
    push_tx(&ctx, 1).await;

    assert_eq!(
        processing.await.unwrap(),
        Ok(FwStep::Processed { seq: 0 })
    );
    assert_eq!(ctx.clock().now(), ctx.settings().fw_proc_ms);
}

#[tokio::test(start_paused = true)]
async fn power_save_entered_once_and_left_on_traffic() {
    let ctx = test_util::context(test_util::settings());
    let mut fw = Firmware::new(ctx.clone());
    let timeout = ctx.settings().idle_timeout_ms;

    let mut entered_at = None;
    for _ in 0..30 {
        let before = ctx.clock().now();
        assert_eq!(fw.step().await, Ok(FwStep::Idle));
        if entered_at.is_none() && ctx.power().state() == PowerState::PowerSave {
            entered_at = Some(before);
        }
    }
    let entered_at = entered_at.expect("firmware never entered power-save");
    assert!(entered_at > timeout);
    assert!(entered_at - ctx.settings().idle_poll_ms <= timeout);
    assert_eq!(ctx.stats().snapshot().power_save_entries, 1);

    push_tx(&ctx, 0).await;
    assert_eq!(fw.step().await, Ok(FwStep::Processed { seq: 0 }));
    assert_eq!(ctx.power().state(), PowerState::Active);
    assert_eq!(ctx.stats().snapshot().power_wakes, 1);
}

#[tokio::test(start_paused = true)]
async fn full_tx_ring_drops_packet() {
    let ctx = test_util::context(test_util::settings().with_ring_capacity(4));
    let mut tx = TxPath::new(ctx.clone());

    for seq in 0..3 {
        assert_eq!(tx.step().await, Ok(TxOutcome::Pushed { seq, retries: 0 }));
    }
    assert_eq!(tx.step().await, Ok(TxOutcome::Dropped { seq: 3 }));
    assert_eq!(tx.next_sequence(), 4);

    let stats = ctx.stats().snapshot();
    assert_eq!(stats.tx_pushed, 3);
    assert_eq!(stats.tx_full, 1);
    assert_eq!(stats.tx_dropped, 1);
    // The dropped packet went back to the pool.
    assert_eq!(ctx.pool().outstanding(), 3);
    assert!(ctx.tx_ring().lock().await.is_full());
}

#[tokio::test(start_paused = true)]
async fn retry_policy_gives_up() {
    let settings = test_util::settings()
        .with_ring_capacity(2)
        .with_tx_full(TxFullPolicy::Retry {
            max_retries: 2,
            backoff_ms: 10,
        });
    let ctx = test_util::context(settings);
    let mut tx = TxPath::new(ctx.clone());
    let period = ctx.settings().tx_period_ms;

    assert_eq!(
        tx.step().await,
        Ok(TxOutcome::Pushed { seq: 0, retries: 0 })
    );
    assert_eq!(tx.step().await, Ok(TxOutcome::Dropped { seq: 1 }));

    let stats = ctx.stats().snapshot();
    assert_eq!(stats.tx_full, 3);
    assert_eq!(stats.tx_retries, 2);
    assert_eq!(stats.tx_dropped, 1);
    // Two periods plus backoffs of 10 and 20.
    assert_eq!(ctx.clock().now(), 2 * period + 30);
    assert_eq!(ctx.pool().outstanding(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_succeeds_once_drained() {
    let settings = test_util::settings()
        .with_ring_capacity(2)
        .with_tx_full(TxFullPolicy::Retry {
            max_retries: 3,
            backoff_ms: 10,
        });
    let ctx = test_util::context(settings);
    let mut tx = TxPath::new(ctx.clone());
    let mut fw = Firmware::new(ctx.clone());

    tx.step().await.unwrap();
    let (sent, processed) = tokio::join!(tx.step(), fw.step());
    assert_eq!(sent, Ok(TxOutcome::Pushed { seq: 1, retries: 1 }));
    assert_eq!(processed, Ok(FwStep::Processed { seq: 0 }));
    assert_eq!(ctx.stats().snapshot().tx_dropped, 0);
}

#[tokio::test(start_paused = true)]
async fn critical_section_drops_completions() {
    let ctx = test_util::context(test_util::settings().with_mask_every(1));
    let mut tx = TxPath::new(ctx.clone());
    let mut fw = Firmware::new(ctx.clone());

    // The firmware finishes packet 0 while the driver still holds the mask.
    let (sent, processed) = tokio::join!(tx.step(), fw.step());
    assert_eq!(sent, Ok(TxOutcome::Pushed { seq: 0, retries: 0 }));
    assert_eq!(processed, Ok(FwStep::Processed { seq: 0 }));

    assert!(!ctx.irq().is_masked());
    assert!(!ctx.doorbell().is_pending());
    let stats = ctx.stats().snapshot();
    assert_eq!(stats.irq_masks, 1);
    assert_eq!(stats.doorbell_masked, 1);
    assert_eq!(rx_sequences(&ctx).await, vec![0]);
}

#[tokio::test(start_paused = true)]
async fn mask_every_counts_packets_sent() {
    let ctx = test_util::context(test_util::settings().with_mask_every(2));
    let mut tx = TxPath::new(ctx.clone());
    let settings = ctx.settings();

    tx.step().await.unwrap();
    assert_eq!(ctx.stats().snapshot().irq_masks, 0);
    tx.step().await.unwrap();
    assert_eq!(ctx.stats().snapshot().irq_masks, 1);
    assert_eq!(
        ctx.clock().now(),
        2 * settings.tx_period_ms + settings.mask_hold_ms
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_pool_is_fatal() {
    let ctx = test_util::context(test_util::settings());
    let mut tx = TxPath::new(ctx.clone());
    let mut fw = Firmware::new(ctx.clone());
    let capacity = ctx.pool().capacity();

    // Leak all but one buffer, then take the last one with a TX packet.
    let _held = (1..capacity as u32)
        .map(|seq| ctx.pool().alloc(Packet::tx(1000 + seq)).unwrap())
        .collect::<Vec<_>>();
    push_tx(&ctx, 0).await;
    assert_eq!(
        tx.step().await,
        Err(SimError::OutOfPackets { capacity })
    );
    // The firmware still holds the TX packet when it allocates the ACK.
    assert_eq!(
        fw.step().await,
        Err(SimError::OutOfPackets { capacity })
    );
}

#[tokio::test(start_paused = true)]
async fn bad_descriptor_length_is_fatal() {
    let ctx = test_util::context(test_util::settings());
    let mut fw = Firmware::new(ctx.clone());

    let pkt = ctx.pool().alloc(Packet::tx(0)).unwrap();
    assert!(ctx.tx_ring().lock().await.push(pkt, 12).is_ok());
    assert!(matches!(fw.step().await, Err(SimError::Invariant(_))));
}

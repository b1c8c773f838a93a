use super::*;

#[tokio::test]
async fn completing_a_ticket_resolves_the_utterance() {
    let slot = UtteranceSlot::new();
    let (utt, ticket) = slot.claim(Some(Duration::from_secs(1)));
    assert!(slot.is_active());
    ticket.complete(SpeechEnd::Finished);
    assert_eq!(utt.finished().await, SpeechEnd::Finished);
    assert!(!slot.is_active());
}

#[tokio::test]
async fn a_new_claim_interrupts_the_previous_one() {
    let slot = UtteranceSlot::new();
    let (first, first_ticket) = slot.claim(None);
    let (_second, _ticket) = slot.claim(None);
    assert!(first_ticket.stop_token().is_cancelled());
    assert_eq!(first.finished().await, SpeechEnd::Interrupted);
    // The stale ticket must not resolve the newer utterance.
    first_ticket.complete(SpeechEnd::Finished);
    assert!(slot.is_active());
}

#[tokio::test]
async fn interrupt_is_idempotent() {
    let slot = UtteranceSlot::new();
    let (utt, _ticket) = slot.claim(None);
    assert!(slot.interrupt());
    assert!(!slot.interrupt());
    assert_eq!(utt.finished().await, SpeechEnd::Interrupted);
}

#[tokio::test]
async fn dropped_sender_reports_lost() {
    let (tx, rx) = oneshot::channel::<SpeechEnd>();
    drop(tx);
    let utt = Utterance {
        expected: None,
        done: rx,
        silencer: Silencer {
            slot: Weak::new(),
            generation: 0,
        },
    };
    assert_eq!(utt.finished().await, SpeechEnd::Lost);
}

#[tokio::test]
async fn silencer_only_reaches_its_own_utterance() {
    let slot = UtteranceSlot::new();
    let (first, _first_ticket) = slot.claim(None);
    let stale = first.silencer();
    let (second, _second_ticket) = slot.claim(None);
    assert_eq!(first.finished().await, SpeechEnd::Interrupted);

    assert!(!stale.silence());
    assert!(slot.is_active());

    let current = second.silencer();
    assert!(current.silence());
    assert!(!current.silence());
    assert_eq!(second.finished().await, SpeechEnd::Interrupted);
    assert!(!slot.is_active());
}

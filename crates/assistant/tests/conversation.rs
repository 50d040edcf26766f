//! End-to-end conversations against the in-memory store.
//!
//! Each test drives the assistant through the same dispatcher the polling loop uses and checks
//! both the outbound chat actions and what ended up in the sheets.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use slotbook_assistant::BookingAssistant;
use slotbook_core::domain::UserId;
use slotbook_core::grid::CellAddress;
use slotbook_core::session::InMemorySessionStore;
use slotbook_sheets::{InMemoryTabularStore, StoreSeed};
use slotbook_telegram::views;
use slotbook_telegram::{
    dispatcher_for, ButtonClickEvent, ChatEnvelope, ChatEvent, EventContext, EventDispatcher,
    HandlerResult, MessageRef, MessageTemplate, Outbound, TextMessageEvent,
};

const USERS: &str = "Users";
const BOOKING: &str = "Booking";
const ALICE: i64 = 777;
const BOB: i64 = 888;

struct Harness {
    store: InMemoryTabularStore,
    dispatcher: Arc<EventDispatcher>,
    next_update: AtomicI64,
}

fn week() -> StoreSeed {
    InMemoryTabularStore::seed()
        .rows(BOOKING, 1, &[&["", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]])
        .rows(
            BOOKING,
            2,
            &[
                &["09:00"],
                &["10:00"],
                &["11:00"],
                &["12:00"],
                &["13:00"],
                &["14:00"],
                &["15:00"],
                &["16:00"],
                &["17:00"],
            ],
        )
}

fn with_alice(seed: StoreSeed) -> StoreSeed {
    seed.rows(USERS, 1, &[&["777", "Alice Smith", "12345"]])
}

impl Harness {
    fn new(seed: StoreSeed) -> Self {
        Self::over(seed.build())
    }

    /// A fresh process over an existing store: sessions start empty.
    fn over(store: InMemoryTabularStore) -> Self {
        let assistant = BookingAssistant::over_store(
            Arc::new(store.clone()),
            Arc::new(InMemorySessionStore::default()),
            USERS,
            BOOKING,
        );
        Self {
            store,
            dispatcher: Arc::new(dispatcher_for(Arc::new(assistant))),
            next_update: AtomicI64::new(1),
        }
    }

    async fn dispatch(&self, event: ChatEvent) -> Vec<Outbound> {
        let update_id = self.next_update.fetch_add(1, Ordering::SeqCst);
        let envelope = ChatEnvelope { update_id, event };
        let result = self
            .dispatcher
            .dispatch(&envelope, &EventContext::for_update(update_id))
            .await
            .expect("dispatch never fails for the assistant");
        match result {
            HandlerResult::Responded(outbound) => outbound,
            HandlerResult::Processed | HandlerResult::Ignored => Vec::new(),
        }
    }

    async fn say(&self, user: i64, text: &str) -> Vec<Outbound> {
        self.dispatch(ChatEvent::TextMessage(TextMessageEvent {
            chat_id: user,
            message_id: 1,
            user_id: UserId(user),
            text: text.to_owned(),
        }))
        .await
    }

    async fn click(&self, user: i64, payload: &str) -> Vec<Outbound> {
        self.dispatch(click_event(user, payload)).await
    }

    async fn cell(&self, reference: &str) -> Option<String> {
        self.store.cell(BOOKING, cell(reference)).await
    }
}

fn click_event(user: i64, payload: &str) -> ChatEvent {
    ChatEvent::ButtonClick(ButtonClickEvent {
        callback_id: format!("cb-{user}-{payload}"),
        user_id: UserId(user),
        message: Some(message(user)),
        payload: payload.to_owned(),
    })
}

fn message(user: i64) -> MessageRef {
    MessageRef { chat_id: user, message_id: 99 }
}

fn cell(reference: &str) -> CellAddress {
    reference.parse().expect("cell reference")
}

fn sent(outbound: &Outbound) -> &MessageTemplate {
    match outbound {
        Outbound::Send { message, .. } => message,
        other => panic!("expected a sent message, got {other:?}"),
    }
}

fn edited(outbound: &Outbound) -> &MessageTemplate {
    match outbound {
        Outbound::Edit { message, .. } => message,
        other => panic!("expected an edited message, got {other:?}"),
    }
}

fn ack(user: i64, payload: &str) -> Outbound {
    Outbound::acknowledge(format!("cb-{user}-{payload}"))
}

fn day_payloads() -> Vec<&'static str> {
    vec!["day_2", "day_3", "day_4", "day_5", "day_6", "day_7", "day_8"]
}

#[tokio::test]
async fn first_start_prompts_for_a_name_not_day_selection() {
    let harness = Harness::new(week());

    let outbound = harness.say(ALICE, "/start").await;

    assert_eq!(outbound, vec![Outbound::send(ALICE, views::name_prompt())]);
}

#[tokio::test]
async fn registration_collects_name_and_identifier_then_offers_days() {
    let harness = Harness::new(week());

    harness.say(ALICE, "/start").await;
    let prompted = harness.say(ALICE, "Alice Smith").await;
    assert_eq!(prompted, vec![Outbound::send(ALICE, views::identifier_prompt())]);

    let registered = harness.say(ALICE, "12345").await;
    assert_eq!(registered.len(), 2);
    assert_eq!(registered[0], Outbound::send(ALICE, views::registration_confirmed()));
    assert_eq!(sent(&registered[1]).callback_payloads(), day_payloads());
    assert_eq!(harness.store.rows(USERS).await, vec![vec!["777", "Alice Smith", "12345"]]);

    let chatter = harness.say(ALICE, "thanks").await;
    assert_eq!(chatter, vec![Outbound::send(ALICE, views::restart_hint())]);
}

#[tokio::test]
async fn registered_user_is_greeted_with_day_buttons() {
    let harness = Harness::new(with_alice(week()));

    let outbound = harness.say(ALICE, "/start").await;

    assert_eq!(outbound.len(), 2);
    assert_eq!(sent(&outbound[0]).text, "👋 Hello, <b>Alice Smith</b>!");
    assert_eq!(sent(&outbound[1]).text, "📅 <b>Choose a day:</b>");
    assert_eq!(sent(&outbound[1]).callback_payloads(), day_payloads());
}

#[tokio::test]
async fn unregistered_chatter_is_ignored_and_my_asks_for_registration() {
    let harness = Harness::new(week());

    assert!(harness.say(BOB, "hello?").await.is_empty());
    assert_eq!(harness.say(BOB, "/my").await, vec![Outbound::send(BOB, views::register_first())]);
}

#[tokio::test]
async fn booking_shows_up_in_the_listing_and_cancelling_removes_it() {
    let harness = Harness::new(with_alice(week()));

    let times = harness.click(ALICE, "day_3").await;
    assert_eq!(times[0], ack(ALICE, "day_3"));
    assert_eq!(edited(&times[1]).text, "🗓 <b>Tue</b>\nChoose a time:");

    let booked = harness.click(ALICE, "book_3_4").await;
    assert_eq!(
        booked,
        vec![ack(ALICE, "book_3_4"), Outbound::edit(message(ALICE), views::booking_confirmed())]
    );
    assert_eq!(harness.cell("C4").await.as_deref(), Some("Alice Smith (12345)"));

    let listing = harness.say(ALICE, "/my").await;
    let listing = sent(&listing[0]);
    assert!(listing.text.contains("👤 <b>Alice Smith (12345)</b>"));
    assert!(listing.text.contains("1. <b>Tue</b>: 11:00"));
    assert_eq!(listing.callback_payloads(), vec!["del_C4", "add_slot"]);

    let cancelled = harness.click(ALICE, "del_C4").await;
    assert_eq!(cancelled.len(), 3);
    assert_eq!(cancelled[0], ack(ALICE, "del_C4"));
    assert_eq!(cancelled[1], Outbound::edit(message(ALICE), views::slot_deleted()));
    assert!(sent(&cancelled[2]).text.ends_with(views::NO_ACTIVE_SLOTS));
    assert_eq!(harness.cell("C4").await, None);
}

#[tokio::test]
async fn cancelling_twice_is_harmless() {
    let harness =
        Harness::new(with_alice(week()).cell(BOOKING, cell("D7"), "Alice Smith (12345)"));

    let first = harness.click(ALICE, "del_D7").await;
    let second = harness.click(ALICE, "del_D7").await;

    assert_eq!(first[1], Outbound::edit(message(ALICE), views::slot_deleted()));
    assert_eq!(second[1], Outbound::edit(message(ALICE), views::slot_deleted()));
    assert_eq!(harness.cell("D7").await, None);
}

#[tokio::test]
async fn taken_slot_alerts_and_refreshes_the_times() {
    let harness = Harness::new(with_alice(week()).cell(BOOKING, cell("C2"), "Bob Jones (999)"));

    let outbound = harness.click(ALICE, "book_3_2").await;

    assert_eq!(outbound.len(), 2);
    assert_eq!(outbound[0], Outbound::alert("cb-777-book_3_2", views::SLOT_TAKEN_ALERT));
    let refreshed = edited(&outbound[1]).callback_payloads();
    assert!(!refreshed.contains(&"book_3_2"));
    assert!(refreshed.contains(&"book_3_3"));
    assert_eq!(harness.cell("C2").await.as_deref(), Some("Bob Jones (999)"));
}

#[tokio::test]
async fn racing_bookers_get_at_most_one_success() {
    let seed = week()
        .rows(USERS, 1, &[&["777", "Alice Smith", "12345"], &["888", "Bob Jones", "999"]]);
    let harness = Harness::new(seed);

    let alice = {
        let dispatcher = Arc::clone(&harness.dispatcher);
        tokio::spawn(async move {
            let envelope = ChatEnvelope { update_id: 100, event: click_event(ALICE, "book_5_6") };
            dispatcher.dispatch(&envelope, &EventContext::for_update(100)).await
        })
    };
    let bob = {
        let dispatcher = Arc::clone(&harness.dispatcher);
        tokio::spawn(async move {
            let envelope = ChatEnvelope { update_id: 101, event: click_event(BOB, "book_5_6") };
            dispatcher.dispatch(&envelope, &EventContext::for_update(101)).await
        })
    };

    let mut confirmations = 0;
    for handle in [alice, bob] {
        let result = handle.await.expect("task joins").expect("dispatch");
        let HandlerResult::Responded(outbound) = result else {
            panic!("clicks are always answered");
        };
        let confirmation = views::booking_confirmed();
        let confirmed = outbound.iter().any(
            |action| matches!(action, Outbound::Edit { message, .. } if *message == confirmation),
        );
        if confirmed {
            confirmations += 1;
        }
    }

    assert_eq!(confirmations, 1);
    let owner = harness.cell("E6").await.expect("cell claimed");
    assert!(owner == "Alice Smith (12345)" || owner == "Bob Jones (999)");
}

#[tokio::test]
async fn fully_booked_day_offers_only_the_back_button() {
    let mut seed = with_alice(week());
    for row in 2..=10 {
        seed = seed.cell(BOOKING, CellAddress::new(5, row).expect("cell"), "Someone (1)");
    }
    let harness = Harness::new(seed);

    let outbound = harness.click(ALICE, "day_5").await;

    let times = edited(&outbound[1]);
    assert!(times.text.ends_with(views::NO_FREE_SLOTS));
    assert_eq!(times.callback_payloads(), vec!["back_days"]);
}

#[tokio::test]
async fn navigation_buttons_replace_the_message_with_day_selection() {
    let harness = Harness::new(with_alice(week()));

    for payload in ["add_slot", "back_days"] {
        let outbound = harness.click(ALICE, payload).await;
        assert_eq!(outbound.len(), 3);
        assert_eq!(outbound[0], ack(ALICE, payload));
        assert_eq!(outbound[1], Outbound::delete(message(ALICE)));
        assert_eq!(sent(&outbound[2]).callback_payloads(), day_payloads());
    }
}

#[tokio::test]
async fn clicks_from_unknown_users_get_an_authentication_error() {
    let harness = Harness::new(week());

    let outbound = harness.click(BOB, "book_2_2").await;

    assert_eq!(
        outbound,
        vec![ack(BOB, "book_2_2"), Outbound::send(BOB, views::authentication_error())]
    );
    assert_eq!(harness.cell("B2").await, None);
}

#[tokio::test]
async fn identity_is_restored_from_the_registry_after_a_restart() {
    let first = Harness::new(week());
    first.say(ALICE, "/start").await;
    first.say(ALICE, "Alice Smith").await;
    first.say(ALICE, "12345").await;

    let restarted = Harness::over(first.store.clone());
    let outbound = restarted.click(ALICE, "book_8_10").await;

    assert_eq!(outbound[1], Outbound::edit(message(ALICE), views::booking_confirmed()));
    assert_eq!(restarted.cell("H10").await.as_deref(), Some("Alice Smith (12345)"));
}

#[tokio::test]
async fn store_outage_on_start_reports_a_db_error() {
    let harness = Harness::new(with_alice(week()));
    harness.store.set_unavailable(true);

    let outbound = harness.say(ALICE, "/start").await;

    assert_eq!(outbound, vec![Outbound::send(ALICE, views::failure("Error with db."))]);
}

#[tokio::test]
async fn failed_registration_append_keeps_the_identifier_prompt() {
    let harness = Harness::new(week());
    harness.say(ALICE, "/start").await;
    harness.say(ALICE, "Alice Smith").await;

    harness.store.set_unavailable(true);
    let failed = harness.say(ALICE, "12345").await;
    assert_eq!(failed, vec![Outbound::send(ALICE, views::registration_not_saved())]);

    harness.store.set_unavailable(false);
    let retried = harness.say(ALICE, "12345").await;
    assert_eq!(retried[0], Outbound::send(ALICE, views::registration_confirmed()));
    assert_eq!(harness.store.rows(USERS).await.len(), 1);
}

#[tokio::test]
async fn read_failures_degrade_per_screen() {
    let harness = Harness::new(with_alice(week()));
    harness.say(ALICE, "/start").await;
    harness.store.set_unavailable(true);

    let days = harness.click(ALICE, "add_slot").await;
    assert_eq!(days[2], Outbound::send(ALICE, views::failure(views::DAYS_UNAVAILABLE)));

    let times = harness.click(ALICE, "day_2").await;
    assert_eq!(times, vec![ack(ALICE, "day_2")]);

    let listing = harness.say(ALICE, "/my").await;
    assert_eq!(listing, vec![Outbound::send(ALICE, views::failure(views::LISTING_UNAVAILABLE))]);
}

#[tokio::test]
async fn malformed_payloads_are_only_acknowledged() {
    let harness = Harness::new(with_alice(week()));

    assert_eq!(harness.click(ALICE, "book_9_2").await, vec![ack(ALICE, "book_9_2")]);
    assert_eq!(harness.click(ALICE, "del_A1").await.len(), 2);
    assert_eq!(harness.cell("A1").await, None);
}

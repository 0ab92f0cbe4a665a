mod common;

use common::Harness;
use rusttestbot::{
    database::Store,
    registration::{Access, Reply},
    state::Session,
};
use teloxide::types::UserId;

#[tokio::test]
async fn first_contact_through_subscription_to_active() {
    let h = Harness::new();
    let user = UserId(100);

    let welcome = h.registrar.first_contact(user).await.unwrap();
    assert_eq!(welcome.next, Session::AwaitingName);
    assert_eq!(welcome.replies, vec![Reply::Welcome, Reply::AskName]);

    let named = h.registrar.submit_name(user, "Alice").await.unwrap();
    assert_eq!(named.next, Session::AwaitingSubscription);
    assert_eq!(named.replies, vec![Reply::NameSaved, Reply::SubscribePrompt]);
    assert_eq!(h.store.get_user(user).await.unwrap().unwrap().name, "Alice");

    let still_out = h.registrar.confirm_subscription(user).await.unwrap();
    assert_eq!(still_out.next, Session::AwaitingSubscription);
    assert_eq!(still_out.replies, vec![Reply::SubscriptionMissing]);

    h.channel.join(user).await;
    let confirmed = h.registrar.confirm_subscription(user).await.unwrap();
    assert_eq!(confirmed.next, Session::Idle);
    assert_eq!(
        confirmed.replies,
        vec![Reply::SubscriptionConfirmed, Reply::Help]
    );
    assert!(matches!(
        h.registrar.ensure_active(user).await.unwrap(),
        Access::Granted(record) if record.name == "Alice"
    ));
}

#[tokio::test]
async fn subscribed_user_goes_straight_to_active() {
    let h = Harness::new();
    let user = UserId(101);
    h.channel.join(user).await;

    let named = h.registrar.submit_name(user, "  Bob  ").await.unwrap();

    assert_eq!(named.next, Session::Idle);
    assert_eq!(named.replies, vec![Reply::NameSaved, Reply::Help]);
    assert_eq!(h.store.get_user(user).await.unwrap().unwrap().name, "Bob");
}

#[tokio::test]
async fn blank_name_is_asked_again() {
    let h = Harness::new();
    let user = UserId(102);

    let retry = h.registrar.submit_name(user, "   ").await.unwrap();

    assert_eq!(retry.next, Session::AwaitingName);
    assert_eq!(retry.replies, vec![Reply::AskName]);
    assert!(h.store.get_user(user).await.unwrap().is_none());
}

#[tokio::test]
async fn rename_works_before_registration_and_keeps_join_date() {
    let h = Harness::new();
    let user = UserId(103);
    h.channel.join(user).await;

    let first = h.registrar.rename(user, "Carol", Session::Idle).await.unwrap();
    assert_eq!(first.next, Session::Idle);
    let joined_at = h.store.get_user(user).await.unwrap().unwrap().joined_at;

    h.registrar.rename(user, "Carol Jones", Session::Idle).await.unwrap();
    let record = h.store.get_user(user).await.unwrap().unwrap();
    assert_eq!(record.name, "Carol Jones");
    assert_eq!(record.joined_at, joined_at);
}

#[tokio::test]
async fn blank_rename_keeps_an_active_user_active() {
    let h = Harness::new();
    let user = h.active_user(105, "Eve").await;

    for name in ["", "   "] {
        let step = h.registrar.rename(user, name, Session::Idle).await.unwrap();
        assert_eq!(step.next, Session::Idle);
        assert_eq!(step.replies, vec![Reply::RenameUsage]);
    }
    assert_eq!(h.store.get_user(user).await.unwrap().unwrap().name, "Eve");

    h.channel.leave(user).await;
    let step = h
        .registrar
        .rename(user, "", Session::AwaitingSubscription)
        .await
        .unwrap();
    assert_eq!(step.next, Session::AwaitingSubscription);
}

#[tokio::test]
async fn blank_rename_before_registration_asks_for_a_name() {
    let h = Harness::new();
    let user = UserId(106);

    let step = h.registrar.rename(user, " ", Session::Idle).await.unwrap();

    assert_eq!(step.next, Session::AwaitingName);
    assert_eq!(step.replies, vec![Reply::AskName]);
    assert!(h.store.get_user(user).await.unwrap().is_none());
}

#[tokio::test]
async fn returning_user_is_not_asked_for_a_name() {
    let h = Harness::new();
    let user = h.active_user(104, "Dan").await;

    let again = h.registrar.first_contact(user).await.unwrap();

    assert_eq!(again.next, Session::Idle);
    assert_eq!(again.replies, vec![Reply::Help]);
}

#[tokio::test]
async fn leaving_the_channel_sends_user_back_to_the_gate() {
    let h = Harness::new();
    let user = h.active_user(105, "Eve").await;
    assert!(matches!(
        h.registrar.ensure_active(user).await.unwrap(),
        Access::Granted(_)
    ));

    h.channel.leave(user).await;

    match h.registrar.ensure_active(user).await.unwrap() {
        Access::Redirect(transition) => {
            assert_eq!(transition.next, Session::AwaitingSubscription);
            assert_eq!(transition.replies, vec![Reply::SubscribePrompt]);
        }
        Access::Granted(_) => panic!("unsubscribed user must not pass the gate"),
    }
}

#[tokio::test]
async fn unknown_user_is_redirected_to_registration() {
    let h = Harness::new();

    match h.registrar.ensure_active(UserId(106)).await.unwrap() {
        Access::Redirect(transition) => assert_eq!(transition.next, Session::AwaitingName),
        Access::Granted(_) => panic!("unregistered user must not pass the gate"),
    }
}

#[tokio::test]
async fn oracle_failure_fails_closed() {
    let h = Harness::new();
    let user = h.active_user(107, "Fay").await;
    h.channel.break_down().await;

    assert!(matches!(
        h.registrar.ensure_active(user).await.unwrap(),
        Access::Redirect(_)
    ));
}

/// Per-chat registration session kept in the dialogue storage.
///
/// Only users in the middle of registration have an entry; completing the
/// flow removes it. `Idle` therefore covers both unregistered users (no user
/// record) and active ones (record present, subscription re-checked on every
/// gated action).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Idle,
    AwaitingName,
    AwaitingSubscription,
}

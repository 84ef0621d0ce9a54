mod common;

use uuid::Uuid;

use threadloom::runtimes::{Checkpoint, CheckpointQuery, Checkpointer, InMemoryCheckpointer};
use threadloom::state::ConversationState;
use threadloom::types::NodeKind;

use common::session;

fn chain_of(thread_id: &str, length: u64) -> Vec<Checkpoint> {
    let turn_id = Uuid::new_v4();
    let state = ConversationState::builder(session())
        .with_user_message("hi")
        .build();
    (1..=length)
        .map(|id| {
            Checkpoint::next(
                thread_id,
                id,
                (id > 1).then(|| id - 1),
                NodeKind::AgentThink,
                turn_id,
                &state,
            )
        })
        .collect()
}

#[tokio::test]
async fn save_and_load_latest_roundtrip() {
    let store = InMemoryCheckpointer::new();
    for checkpoint in chain_of("t1", 3) {
        store.save(checkpoint).await.unwrap();
    }

    let latest = store.load_latest("t1").await.unwrap().unwrap();
    assert_eq!(latest.checkpoint_id, 3);
    assert_eq!(latest.parent_id, Some(2));
    assert_eq!(latest.state.messages.len(), 1);
}

#[tokio::test]
async fn missing_thread_is_absent_not_an_error() {
    let store = InMemoryCheckpointer::new();
    assert!(store.load_latest("ghost").await.unwrap().is_none());
    assert!(store.load("ghost", 1).await.unwrap().is_none());
    assert!(
        store
            .list("ghost", CheckpointQuery::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn load_fetches_one_specific_checkpoint() {
    let store = InMemoryCheckpointer::new();
    for checkpoint in chain_of("t1", 4) {
        store.save(checkpoint).await.unwrap();
    }

    let second = store.load("t1", 2).await.unwrap().unwrap();
    assert_eq!(second.checkpoint_id, 2);
    assert_eq!(second.parent_id, Some(1));
    assert!(store.load("t1", 9).await.unwrap().is_none());
}

#[tokio::test]
async fn list_is_newest_first_and_restartable() {
    let store = InMemoryCheckpointer::new();
    for checkpoint in chain_of("t1", 5) {
        store.save(checkpoint).await.unwrap();
    }

    let all = store.list("t1", CheckpointQuery::default()).await.unwrap();
    let ids: Vec<u64> = all.iter().map(|c| c.checkpoint_id).collect();
    assert_eq!(ids, vec![5, 4, 3, 2, 1]);

    let first_page = store
        .list(
            "t1",
            CheckpointQuery {
                limit: Some(2),
                before: None,
            },
        )
        .await
        .unwrap();
    let ids: Vec<u64> = first_page.iter().map(|c| c.checkpoint_id).collect();
    assert_eq!(ids, vec![5, 4]);

    // Restart from the last seen id.
    let next_page = store
        .list(
            "t1",
            CheckpointQuery {
                limit: Some(2),
                before: Some(4),
            },
        )
        .await
        .unwrap();
    let ids: Vec<u64> = next_page.iter().map(|c| c.checkpoint_id).collect();
    assert_eq!(ids, vec![3, 2]);
}

#[tokio::test]
async fn chain_parent_linkage_is_intact() {
    let store = InMemoryCheckpointer::new();
    for checkpoint in chain_of("t1", 6) {
        store.save(checkpoint).await.unwrap();
    }

    let chain = store.list("t1", CheckpointQuery::default()).await.unwrap();
    for window in chain.windows(2) {
        assert_eq!(window[0].parent_id, Some(window[1].checkpoint_id));
    }
    assert_eq!(chain.last().unwrap().parent_id, None);
}

#[tokio::test]
async fn resave_of_same_id_replaces_in_place() {
    let store = InMemoryCheckpointer::new();
    let mut checkpoints = chain_of("t1", 2);
    store.save(checkpoints.remove(0)).await.unwrap();
    let mut second = checkpoints.remove(0);
    store.save(second.clone()).await.unwrap();

    second.state.push_message(threadloom::message::Message::assistant("retry"));
    store.save(second).await.unwrap();

    let chain = store.list("t1", CheckpointQuery::default()).await.unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].state.messages.len(), 2);
}

#[tokio::test]
async fn threads_are_isolated() {
    let store = InMemoryCheckpointer::new();
    for checkpoint in chain_of("alpha", 2) {
        store.save(checkpoint).await.unwrap();
    }
    for checkpoint in chain_of("beta", 1) {
        store.save(checkpoint).await.unwrap();
    }

    let mut ids = store.thread_ids().await;
    ids.sort();
    assert_eq!(ids, vec!["alpha", "beta"]);
    assert_eq!(store.load_latest("beta").await.unwrap().unwrap().checkpoint_id, 1);
}

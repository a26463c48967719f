//! Event subscriptions and listeners over a scripted node

mod mocks;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use monkabreak_client::abi::events;
use monkabreak_client::{
    Amount, BlockedPath, GameClientError, GameEvent, GameEventHandler, GameId, PathChoice,
};

use mocks::{address_topic, client, event_log, player, uint_topic};

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn subscription_survives_undecodable_logs() {
    let (client, rpc, _signer) = client();

    let mut unknown = event_log(events::GAME_STARTED, vec![uint_topic(1)], vec![]);
    unknown.topics[0] = H256::repeat_byte(0x42);
    rpc.push_logs(vec![
        unknown,
        event_log(
            events::GAME_STARTED,
            vec![uint_topic(1)],
            vec![Token::Uint(U256::from(42u64))],
        ),
    ]);

    let mut subscription = client.subscribe(Some(1));

    let first = tokio::time::timeout(WAIT, subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, Err(GameClientError::EventDecode { .. })));

    let second = tokio::time::timeout(WAIT, subscription.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        second.event,
        GameEvent::GameStarted {
            game_id: GameId::from(1),
            start_block: 42,
        }
    );
    assert_eq!(second.block_number, Some(5));

    subscription.unsubscribe();
}

#[tokio::test]
async fn subscription_keeps_polling_new_blocks() {
    let (client, rpc, _signer) = client();
    let mut subscription = client.subscribe(None);

    // Let the first polls pass with nothing to report
    tokio::time::sleep(Duration::from_millis(50)).await;
    rpc.head.store(11, Ordering::SeqCst);
    rpc.push_logs(vec![event_log(
        events::VOTE_CAST,
        vec![uint_topic(3), address_topic(player())],
        vec![Token::Uint(1u64.into()), Token::Uint(2u64.into())],
    )]);

    let logged = tokio::time::timeout(WAIT, subscription.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        logged.event,
        GameEvent::VoteCast {
            game_id: GameId::from(3),
            voter: player(),
            stage: 1,
            blocked_path: BlockedPath::from(PathChoice::C),
        }
    );
    assert!(rpc.log_queries.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn failed_poll_is_reported_and_polling_continues() {
    let (client, rpc, _signer) = client();
    rpc.fail_next_logs(GameClientError::EndpointUnreachable {
        message: "connection reset".to_string(),
    });
    rpc.push_logs(vec![event_log(
        events::GAME_STARTED,
        vec![uint_topic(1)],
        vec![Token::Uint(U256::from(3u64))],
    )]);

    let mut subscription = client.subscribe(Some(1));

    let first = tokio::time::timeout(WAIT, subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, Err(GameClientError::EndpointUnreachable { .. })));

    let second = tokio::time::timeout(WAIT, subscription.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        second.event,
        GameEvent::GameStarted {
            game_id: GameId::from(1),
            start_block: 3,
        }
    );
}

async fn wait_for_first_poll(rpc: &mocks::MockRpc) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while rpc.log_queries.load(Ordering::SeqCst) == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(rpc.log_queries.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn unsubscribe_stops_polling() {
    let (client, rpc, _signer) = client();
    let subscription = client.subscribe(None);
    wait_for_first_poll(&rpc).await;

    subscription.unsubscribe();
    let polls = rpc.log_queries.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(rpc.log_queries.load(Ordering::SeqCst), polls);
}

#[tokio::test]
async fn dropping_subscription_stops_polling() {
    let (client, rpc, _signer) = client();
    let subscription = client.subscribe(None);
    wait_for_first_poll(&rpc).await;

    drop(subscription);
    let polls = rpc.log_queries.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(rpc.log_queries.load(Ordering::SeqCst), polls);
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl GameEventHandler for Recorder {
    fn on_game_created(&mut self, game_id: GameId, _creator: Address, entry_fee: Amount) {
        self.seen
            .lock()
            .unwrap()
            .push(format!("created {game_id} for {entry_fee}"));
    }

    fn on_game_finalized(&mut self, game_id: GameId, winners: &[Address], _prize: Amount) {
        self.seen
            .lock()
            .unwrap()
            .push(format!("finalized {game_id} with {} winners", winners.len()));
    }
}

#[tokio::test]
async fn listener_dispatches_to_handler() {
    let (client, rpc, _signer) = client();
    rpc.push_logs(vec![
        event_log(
            events::GAME_CREATED,
            vec![uint_topic(9), address_topic(player())],
            vec![Token::Uint(Amount::parse("3").unwrap().wei())],
        ),
        event_log(
            events::GAME_FINALIZED,
            vec![uint_topic(9)],
            vec![
                Token::Array(vec![Token::Address(player())]),
                Token::Uint(Amount::parse("6").unwrap().wei()),
            ],
        ),
    ]);

    let recorder = Recorder::default();
    let listener = client.setup_event_listeners(recorder.clone());

    let deadline = tokio::time::Instant::now() + WAIT;
    while recorder.seen.lock().unwrap().len() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(
        *recorder.seen.lock().unwrap(),
        vec![
            "created 9 for 3".to_string(),
            "finalized 9 with 1 winners".to_string(),
        ]
    );
    assert!(listener.is_running());
    listener.unsubscribe();
}

#![cfg(test)]

use crate::{Error, OracleRng, OracleRngClient, RandomnessPurpose};
use soroban_sdk::testutils::{Address as _, Ledger as _};
use soroban_sdk::{contract, contractimpl, symbol_short, Address, Env};

// ============================================================================
// Mock Consumer for Unit Testing
// ============================================================================

#[contract]
pub struct MockConsumer;

#[contractimpl]
impl MockConsumer {
    pub fn receive_random(env: Env, request_id: u64, word: u64) {
        env.storage()
            .instance()
            .set(&symbol_short!("last"), &(request_id, word));
    }

    pub fn last_received(env: Env) -> Option<(u64, u64)> {
        env.storage().instance().get(&symbol_short!("last"))
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

fn setup_test() -> (
    Env,
    OracleRngClient<'static>,
    MockConsumerClient<'static>,
    Address,
    Address,
) {
    let env = Env::default();
    env.mock_all_auths();

    env.ledger().set(soroban_sdk::testutils::LedgerInfo {
        timestamp: 1_441_065_600,
        protocol_version: 25,
        sequence_number: 100,
        network_id: Default::default(),
        base_reserve: 10,
        min_temp_entry_ttl: u32::MAX / 2,
        min_persistent_entry_ttl: u32::MAX / 2,
        max_entry_ttl: u32::MAX / 2,
    });

    let operator = Address::generate(&env);
    let contract_id = env.register(OracleRng, (&operator,));
    let client = OracleRngClient::new(&env, &contract_id);

    let consumer_addr = env.register(MockConsumer, ());
    let consumer = MockConsumerClient::new(&env, &consumer_addr);

    (env, client, consumer, consumer_addr, operator)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn constructor_stores_operator() {
    let (_env, client, _consumer, _consumer_addr, operator) = setup_test();
    assert_eq!(client.get_operator(), operator);
}

#[test]
fn request_ids_are_monotonic_from_one() {
    let (_env, client, _consumer, consumer_addr, _operator) = setup_test();

    let first = client.request_random(&consumer_addr, &1, &RandomnessPurpose::DiceRoll);
    let second = client.request_random(&consumer_addr, &1, &RandomnessPurpose::TurnAssignment);

    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[test]
fn request_is_recorded_unfulfilled() {
    let (_env, client, _consumer, consumer_addr, _operator) = setup_test();

    let id = client.request_random(&consumer_addr, &9, &RandomnessPurpose::DiceRoll);
    let record = client.get_request(&id).unwrap();

    assert_eq!(record.requester, consumer_addr);
    assert_eq!(record.session_id, 9);
    assert_eq!(record.purpose, RandomnessPurpose::DiceRoll);
    assert!(!record.fulfilled);
    assert!(!client.is_ready(&id));
}

#[test]
fn take_random_before_fulfillment_fails() {
    let (_env, client, _consumer, consumer_addr, _operator) = setup_test();

    let id = client.request_random(&consumer_addr, &1, &RandomnessPurpose::DiceRoll);

    let res = client.try_take_random(&id);
    match res {
        Err(Ok(e)) => assert_eq!(e, Error::RandomWordIsNotReadyYet),
        _ => panic!("Expected RandomWordIsNotReadyYet"),
    }
}

#[test]
fn fulfill_stores_word_and_pushes_to_requester() {
    let (_env, client, consumer, consumer_addr, _operator) = setup_test();

    let id = client.request_random(&consumer_addr, &1, &RandomnessPurpose::DiceRoll);
    client.fulfill_random(&id, &42);

    let record = client.get_request(&id).unwrap();
    assert!(record.fulfilled);
    assert_eq!(record.word, 42);
    assert!(client.is_ready(&id));
    assert_eq!(client.take_random(&id), 42);

    // The word was delivered through the consumer callback.
    assert_eq!(consumer.last_received(), Some((id, 42)));
}

#[test]
fn fulfill_unknown_request_fails() {
    let (_env, client, _consumer, _consumer_addr, _operator) = setup_test();

    let res = client.try_fulfill_random(&77, &13);
    match res {
        Err(Ok(e)) => assert_eq!(e, Error::RequestNotFound),
        _ => panic!("Expected RequestNotFound"),
    }
}

#[test]
fn fulfill_twice_fails() {
    let (_env, client, _consumer, consumer_addr, _operator) = setup_test();

    let id = client.request_random(&consumer_addr, &1, &RandomnessPurpose::DiceRoll);
    client.fulfill_random(&id, &5);

    let res = client.try_fulfill_random(&id, &6);
    match res {
        Err(Ok(e)) => assert_eq!(e, Error::AlreadyFulfilled),
        _ => panic!("Expected AlreadyFulfilled"),
    }

    // The first word stands.
    assert_eq!(client.take_random(&id), 5);
}

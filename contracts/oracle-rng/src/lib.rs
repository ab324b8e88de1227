#![no_std]

//! Oracle randomness provider.
//!
//! Two-phase randomness: a consumer contract requests a word and an off-chain
//! operator fulfills it in a later transaction. Fulfillment stores the word in
//! the request record and then pushes it back to the requester through its
//! `receive_random` entry point, so consumers do not have to poll.
//! `is_ready`/`take_random` stay available for consumers that poll anyway.
//!
//! Request records are never deleted and accept exactly one fulfillment.

use soroban_sdk::{
    contract, contractclient, contracterror, contractevent, contractimpl, contracttype, Address,
    Env,
};

#[cfg(test)]
mod test;

// ============================================================================
// Consumer Interface
// ============================================================================

#[contractclient(name = "RandomnessConsumerClient")]
pub trait RandomnessConsumer {
    fn receive_random(env: Env, request_id: u64, word: u64);
}

// ============================================================================
// Errors
// ============================================================================

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    RequestNotFound = 1,
    RandomWordIsNotReadyYet = 2,
    AlreadyFulfilled = 3,
}

// ============================================================================
// Events
// ============================================================================

#[contractevent]
pub struct RandomnessRequested {
    pub request_id: u64,
    pub requester: Address,
    pub session_id: u32,
}

#[contractevent]
pub struct RandomnessFulfilled {
    pub request_id: u64,
}

// ============================================================================
// Data Types
// ============================================================================

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RandomnessPurpose {
    TurnAssignment = 0,
    DiceRoll = 1,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RandomnessRequest {
    pub requester: Address,
    pub session_id: u32,
    pub purpose: RandomnessPurpose,
    pub fulfilled: bool,
    pub word: u64,
}

// ============================================================================
// Storage
// ============================================================================

#[contracttype]
pub enum DataKey {
    Operator,
    NextRequestId,
    Request(u64),
}

const REQUEST_TTL_LEDGERS: u32 = 518_400; // ~30 days

// ============================================================================
// Contract
// ============================================================================

#[contract]
pub struct OracleRng;

#[contractimpl]
impl OracleRng {
    /// Deploy with the operator allowed to fulfill requests.
    pub fn __constructor(env: Env, operator: Address) {
        env.storage().instance().set(&DataKey::Operator, &operator);
    }

    /// Open a request on behalf of `requester`. The word arrives later via
    /// `fulfill_random`, which pushes it to the requester's `receive_random`.
    pub fn request_random(
        env: Env,
        requester: Address,
        session_id: u32,
        purpose: RandomnessPurpose,
    ) -> u64 {
        requester.require_auth();

        let request_id = Self::next_request_id(&env);
        let request = RandomnessRequest {
            requester: requester.clone(),
            session_id,
            purpose,
            fulfilled: false,
            word: 0,
        };
        Self::store_request(&env, request_id, &request);

        RandomnessRequested {
            request_id,
            requester,
            session_id,
        }
        .publish(&env);

        request_id
    }

    /// Operator-only. Stores the word, then delivers it to the requester.
    pub fn fulfill_random(env: Env, request_id: u64, word: u64) -> Result<(), Error> {
        let operator: Address = env.storage().instance().get(&DataKey::Operator).unwrap();
        operator.require_auth();

        let mut request = Self::load_request(&env, request_id).ok_or(Error::RequestNotFound)?;
        if request.fulfilled {
            return Err(Error::AlreadyFulfilled);
        }
        request.fulfilled = true;
        request.word = word;
        Self::store_request(&env, request_id, &request);

        RandomnessFulfilled { request_id }.publish(&env);

        let consumer = RandomnessConsumerClient::new(&env, &request.requester);
        consumer.receive_random(&request_id, &word);
        Ok(())
    }

    pub fn is_ready(env: Env, request_id: u64) -> bool {
        match Self::load_request(&env, request_id) {
            Some(request) => request.fulfilled,
            None => false,
        }
    }

    pub fn take_random(env: Env, request_id: u64) -> Result<u64, Error> {
        let request = Self::load_request(&env, request_id).ok_or(Error::RequestNotFound)?;
        if !request.fulfilled {
            return Err(Error::RandomWordIsNotReadyYet);
        }
        Ok(request.word)
    }

    /// Read back a request record (for inspection / debugging).
    pub fn get_request(env: Env, request_id: u64) -> Option<RandomnessRequest> {
        Self::load_request(&env, request_id)
    }

    pub fn get_operator(env: Env) -> Address {
        env.storage().instance().get(&DataKey::Operator).unwrap()
    }

    // --- Internals ---

    fn next_request_id(env: &Env) -> u64 {
        let id: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextRequestId)
            .unwrap_or(1);
        env.storage()
            .instance()
            .set(&DataKey::NextRequestId, &id.saturating_add(1));
        id
    }

    fn load_request(env: &Env, request_id: u64) -> Option<RandomnessRequest> {
        env.storage().persistent().get(&DataKey::Request(request_id))
    }

    fn store_request(env: &Env, request_id: u64, request: &RandomnessRequest) {
        let key = DataKey::Request(request_id);
        env.storage().persistent().set(&key, request);
        env.storage()
            .persistent()
            .extend_ttl(&key, REQUEST_TTL_LEDGERS, REQUEST_TTL_LEDGERS);
    }
}

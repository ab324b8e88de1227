#![no_std]

//! Block-delay randomness provider.
//!
//! Trustless counterpart to `oracle-rng`: instead of waiting for an off-chain
//! operator, a consumer requests a word, waits out a fixed number of ledgers,
//! and pulls the value itself. The word is derived from ledger entropy at
//! consumption time and then pinned in the request record, so every later
//! read agrees with the first.
//!
//! ## Readiness rules
//!
//! - `DiceRoll` requests become consumable once `DELAY_LEDGERS` ledgers have
//!   closed on top of the request's stamp.
//! - `TurnAssignment` requests are consumable immediately and always resolve
//!   to word 0: under this strategy the first turn goes to player index 0.
//!
//! Request records are never deleted; consumption is idempotent.

use soroban_sdk::{contract, contracterror, contractimpl, contracttype, Address, Bytes, Env};


// ============================================================================
// Errors
// ============================================================================

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    RequestNotFound = 1,
    RandomWordIsNotReadyYet = 2,
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
    /// Ledger sequence at request time; readiness is measured from here.
    pub stamped_ledger: u32,
    pub fulfilled: bool,
    pub word: u64,
}

// ============================================================================
// Storage
// ============================================================================

#[contracttype]
pub enum DataKey {
    NextRequestId,
    Request(u64),
}

/// Ledgers that must close on top of a dice-roll request before consumption.
const DELAY_LEDGERS: u32 = 5;
const REQUEST_TTL_LEDGERS: u32 = 518_400; // ~30 days

// ============================================================================
// Contract
// ============================================================================

#[contract]
pub struct LedgerRng;

#[contractimpl]
impl LedgerRng {
    /// Stamp a new request against the current ledger and hand back its id.
    pub fn request_random(
        env: Env,
        requester: Address,
        session_id: u32,
        purpose: RandomnessPurpose,
    ) -> u64 {
        requester.require_auth();

        let request_id = Self::next_request_id(&env);
        let request = RandomnessRequest {
            requester,
            session_id,
            purpose,
            stamped_ledger: env.ledger().sequence(),
            fulfilled: false,
            word: 0,
        };
        Self::store_request(&env, request_id, &request);
        request_id
    }

    pub fn is_ready(env: Env, request_id: u64) -> bool {
        match Self::load_request(&env, request_id) {
            Some(request) => Self::ready(&env, &request),
            None => false,
        }
    }

    /// Consume a request. The first successful call derives the word and pins
    /// it in the record; later calls return the pinned value.
    pub fn take_random(env: Env, request_id: u64) -> Result<u64, Error> {
        let mut request = Self::load_request(&env, request_id).ok_or(Error::RequestNotFound)?;
        if request.fulfilled {
            return Ok(request.word);
        }
        if !Self::ready(&env, &request) {
            return Err(Error::RandomWordIsNotReadyYet);
        }

        request.word = Self::derive_word(&env, request_id, &request);
        request.fulfilled = true;
        Self::store_request(&env, request_id, &request);
        Ok(request.word)
    }

    /// Read back a request record (for inspection / debugging).
    pub fn get_request(env: Env, request_id: u64) -> Option<RandomnessRequest> {
        Self::load_request(&env, request_id)
    }

    // --- Internals ---

    fn ready(env: &Env, request: &RandomnessRequest) -> bool {
        match request.purpose {
            RandomnessPurpose::TurnAssignment => true,
            RandomnessPurpose::DiceRoll => {
                request.fulfilled
                    || env.ledger().sequence()
                        >= request.stamped_ledger.saturating_add(DELAY_LEDGERS)
            }
        }
    }

    fn derive_word(env: &Env, request_id: u64, request: &RandomnessRequest) -> u64 {
        match request.purpose {
            // The minimal variant assigns the first turn without waiting.
            RandomnessPurpose::TurnAssignment => 0,
            RandomnessPurpose::DiceRoll => {
                let mut seed_data = Bytes::from_array(env, &request_id.to_be_bytes());
                seed_data.append(&Bytes::from_array(env, &request.session_id.to_be_bytes()));
                seed_data.append(&Bytes::from_array(
                    env,
                    &request.stamped_ledger.to_be_bytes(),
                ));
                seed_data.append(&Bytes::from_array(
                    env,
                    &env.ledger().sequence().to_be_bytes(),
                ));
                seed_data.append(&Bytes::from_array(
                    env,
                    &env.ledger().timestamp().to_be_bytes(),
                ));
                let seed_hash = env.crypto().keccak256(&seed_data);
                env.prng().seed(seed_hash.into());
                env.prng().gen::<u64>()
            }
        }
    }

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

#![no_std]

//! Dice Rally session manager.
//!
//! On-ledger state machine for a turn-based dice-board game. Players escrow a
//! fixed entry stake of the configured token, join a session up to capacity,
//! and take turns rolling a die whose value comes from an external randomness
//! provider contract (`oracle-rng` or `ledger-rng`, chosen at deployment).
//!
//! The manager keeps at most one outstanding randomness request per session
//! and applies each resolved word exactly once, whether it arrives through
//! the provider's push callback or by polling.

use soroban_sdk::{
    contract, contractclient, contracterror, contractevent, contractimpl, contracttype, token,
    vec, Address, Env, Vec,
};


mod board;

// ============================================================================
// Randomness Provider Interface
// ============================================================================

// Re-declared here so the manager builds against the interface alone; both
// provider contracts implement it with matching symbols.
#[contractclient(name = "RandomnessProviderClient")]
pub trait RandomnessProvider {
    fn request_random(
        env: Env,
        requester: Address,
        session_id: u32,
        purpose: RandomnessPurpose,
    ) -> u64;

    fn is_ready(env: Env, request_id: u64) -> bool;

    fn take_random(env: Env, request_id: u64) -> u64;
}

// ============================================================================
// Errors
// ============================================================================

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    PlayerAlreadyInSession = 1,
    BelowMinimumSessionPrice = 2,
    TargetSessionIsStarted = 3,
    TargetSessionIsFull = 4,
    SentDifferentSessionPrice = 5,
    Minimum2PlayersNeeded = 6,
    NotYourTurn = 7,
    RandomWordIsNotReadyYet = 8,
    SessionNotFound = 9,
    PlayerNotInSession = 10,
    SessionNotStarted = 11,
    NotSessionAdmin = 12,
}

// ============================================================================
// Events
// ============================================================================

#[contractevent]
pub struct SessionCreated {
    pub session_id: u32,
    pub admin: Address,
    pub session_price: i128,
}

#[contractevent]
pub struct PlayerJoined {
    pub session_id: u32,
    pub player: Address,
    pub player_count: u32,
}

#[contractevent]
pub struct SessionStarted {
    pub session_id: u32,
    pub player_count: u32,
}

#[contractevent]
pub struct TurnAssigned {
    pub session_id: u32,
    pub whose_turn: u32,
}

#[contractevent]
pub struct DiceRequested {
    pub session_id: u32,
    pub player: Address,
    pub request_id: u64,
}

/// Emitted when a roll is applied. `tax` and `rent` are informational
/// amounts derived from the landing zone; no balance moves here.
#[contractevent]
pub struct DiceResolved {
    pub session_id: u32,
    pub player: Address,
    pub face: u32,
    pub position: u32,
    pub zone: u32,
    pub tax: i128,
    pub rent: i128,
}

#[contractevent]
pub struct PlayerExited {
    pub session_id: u32,
    pub player: Address,
    pub player_count: u32,
}

#[contractevent]
pub struct SessionDissolved {
    pub session_id: u32,
    pub admin: Address,
}

#[contractevent]
pub struct SessionFinished {
    pub session_id: u32,
    pub winner: Address,
    pub pot: i128,
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
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionStatus {
    Open = 1,
    Started = 2,
    Finished = 3,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub session_id: u32,
    pub admin: Address,
    pub session_price: i128,
    pub max_player_amount: u32,
    /// Join order; the admin is always index 0.
    pub players: Vec<Address>,
    pub player_count: u32,
    /// Parallel to `players`; empty until the session starts.
    pub player_positions: Vec<u32>,
    pub status: SessionStatus,
    pub whose_turn: u32,
    /// At most one randomness request is outstanding per session.
    pub pending_request: Option<u64>,
    pub pot: i128,
    pub winner: Option<Address>,
}

/// Book-keeping for one issued randomness request. Records are never deleted;
/// the `fulfilled` flag is what makes a duplicate fulfillment a no-op.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RandomnessRequest {
    pub session_admin: Address,
    /// Guards against a session recreated under the same admin key consuming
    /// a fulfillment addressed to its predecessor.
    pub session_id: u32,
    pub purpose: RandomnessPurpose,
    pub fulfilled: bool,
    pub value: u64,
}

#[contracttype]
pub enum DataKey {
    Admin,
    Provider,
    StakeToken,
    MinSessionPrice,
    NextSessionId,
    Session(Address),
    Membership(Address),
    Request(u64),
}

// ============================================================================
// Contract Implementation
// ============================================================================

const MAX_PLAYER_AMOUNT: u32 = 10;
const MIN_PLAYERS_TO_START: u32 = 2;
const STORAGE_TTL_LEDGERS: u32 = 518_400; // ~30 days

#[contract]
pub struct DiceRally;

#[contractimpl]
impl DiceRally {
    pub fn __constructor(
        env: Env,
        admin: Address,
        provider: Address,
        stake_token: Address,
        min_session_price: i128,
    ) {
        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Provider, &provider);
        env.storage().instance().set(&DataKey::StakeToken, &stake_token);
        env.storage()
            .instance()
            .set(&DataKey::MinSessionPrice, &min_session_price);
    }

    /// Create a session and escrow the creator's stake. The stake becomes the
    /// session price every later entrant must match; the creator becomes the
    /// session admin and player index 0.
    pub fn create_session(env: Env, creator: Address, stake: i128) -> Result<u32, Error> {
        creator.require_auth();

        let min_price: i128 = env
            .storage()
            .instance()
            .get(&DataKey::MinSessionPrice)
            .unwrap();
        if stake < min_price {
            return Err(Error::BelowMinimumSessionPrice);
        }
        Self::record_membership(&env, &creator, &creator)?;

        Self::escrow_stake(&env, &creator, stake);

        let session_id = Self::next_session_id(&env);
        let session = Session {
            session_id,
            admin: creator.clone(),
            session_price: stake,
            max_player_amount: MAX_PLAYER_AMOUNT,
            players: vec![&env, creator.clone()],
            player_count: 1,
            player_positions: Vec::new(&env),
            status: SessionStatus::Open,
            whose_turn: 0,
            pending_request: None,
            pot: stake,
            winner: None,
        };
        Self::store_session(&env, &creator, &session);

        SessionCreated {
            session_id,
            admin: creator,
            session_price: stake,
        }
        .publish(&env);
        Ok(session_id)
    }

    /// Join an open session at its exact price.
    pub fn enter_session(
        env: Env,
        player: Address,
        admin_key: Address,
        stake: i128,
    ) -> Result<(), Error> {
        player.require_auth();

        let mut session = Self::load_session(&env, &admin_key)?;
        if session.status != SessionStatus::Open {
            return Err(Error::TargetSessionIsStarted);
        }
        if session.player_count == session.max_player_amount {
            return Err(Error::TargetSessionIsFull);
        }
        if stake != session.session_price {
            return Err(Error::SentDifferentSessionPrice);
        }
        Self::record_membership(&env, &player, &admin_key)?;

        Self::escrow_stake(&env, &player, stake);

        session.players.push_back(player.clone());
        session.player_count += 1;
        session.pot += stake;
        Self::store_session(&env, &admin_key, &session);

        PlayerJoined {
            session_id: session.session_id,
            player,
            player_count: session.player_count,
        }
        .publish(&env);
        Ok(())
    }

    /// Start the caller's session. Only the admin may start. The first turn
    /// is seeded through the randomness provider: a provider that is ready
    /// right away (the block-delay strategy degenerates turn assignment to an
    /// instant word) resolves in this call, the oracle leaves the session
    /// blocked until its callback lands.
    pub fn start_session(env: Env, caller: Address) -> Result<(), Error> {
        caller.require_auth();

        let admin_key = Self::lookup_membership(&env, &caller)?;
        let mut session = Self::load_session(&env, &admin_key)?;
        if session.admin != caller {
            return Err(Error::NotSessionAdmin);
        }
        if session.status != SessionStatus::Open {
            return Err(Error::TargetSessionIsStarted);
        }
        if session.player_count < MIN_PLAYERS_TO_START {
            return Err(Error::Minimum2PlayersNeeded);
        }

        let mut positions = Vec::new(&env);
        for _ in 0..session.player_count {
            positions.push_back(0u32);
        }
        session.player_positions = positions;
        session.status = SessionStatus::Started;
        session.whose_turn = 0;

        let request_id =
            Self::issue_request(&env, &mut session, RandomnessPurpose::TurnAssignment);
        Self::store_session(&env, &admin_key, &session);

        SessionStarted {
            session_id: session.session_id,
            player_count: session.player_count,
        }
        .publish(&env);

        Self::try_consume_pending(&env, request_id);
        Ok(())
    }

    /// Roll the die. The caller must hold the current turn and the session's
    /// previous request must have resolved. Returns the id of the newly
    /// issued request, or the consumed one when a caught-up word ends the
    /// game and there is no roll left to take.
    ///
    /// An outstanding request is caught up first: with the block-delay
    /// provider the word for the previous roll is consumed by whoever calls
    /// next, which is how the turn actually advances between players.
    pub fn dice(env: Env, player: Address) -> Result<u64, Error> {
        player.require_auth();

        let admin_key = Self::lookup_membership(&env, &player)?;
        let mut session = Self::load_session(&env, &admin_key)?;
        if session.status != SessionStatus::Started {
            return Err(Error::SessionNotStarted);
        }

        if let Some(pending_id) = session.pending_request {
            if !Self::try_consume_pending(&env, pending_id) {
                return Err(Error::RandomWordIsNotReadyYet);
            }
            session = Self::load_session(&env, &admin_key)?;
            if session.status != SessionStatus::Started {
                // The caught-up roll finished the game. Returning Ok keeps
                // the settlement on the ledger; an error here would revert
                // the whole call, finish included.
                return Ok(pending_id);
            }
        }

        let player_index =
            Self::player_index(&session, &player).ok_or(Error::PlayerNotInSession)?;
        if player_index != session.whose_turn {
            return Err(Error::NotYourTurn);
        }

        let request_id = Self::issue_request(&env, &mut session, RandomnessPurpose::DiceRoll);
        Self::store_session(&env, &admin_key, &session);

        DiceRequested {
            session_id: session.session_id,
            player,
            request_id,
        }
        .publish(&env);

        Self::try_consume_pending(&env, request_id);
        Ok(request_id)
    }

    /// Leave an open session. A non-admin member is removed and refunded,
    /// with the order of the remaining players preserved; the admin leaving
    /// dissolves the whole session and refunds everyone.
    pub fn exit_session(env: Env, player: Address) -> Result<(), Error> {
        player.require_auth();

        let admin_key = Self::lookup_membership(&env, &player)?;
        let mut session = Self::load_session(&env, &admin_key)?;
        if session.status != SessionStatus::Open {
            return Err(Error::TargetSessionIsStarted);
        }

        if player == session.admin {
            return Self::dissolve_session(&env, &admin_key, &session);
        }

        let index = Self::player_index(&session, &player).ok_or(Error::PlayerNotInSession)?;
        session.players.remove(index);
        session.player_count -= 1;
        session.pot -= session.session_price;
        Self::clear_membership(&env, &player);
        Self::store_session(&env, &admin_key, &session);

        Self::release_stake(&env, &player, session.session_price);

        PlayerExited {
            session_id: session.session_id,
            player,
            player_count: session.player_count,
        }
        .publish(&env);
        Ok(())
    }

    /// Fulfillment callback from the configured provider. Unknown, duplicate,
    /// or stale fulfillments are ignored without error so a replayed callback
    /// can never re-apply a move.
    pub fn receive_random(env: Env, request_id: u64, word: u64) {
        let provider: Address = env.storage().instance().get(&DataKey::Provider).unwrap();
        provider.require_auth();

        Self::apply_random_word(&env, request_id, word);
    }

    /// Public crank: consume a ready word for a session without burning a
    /// turn call. Anyone may drive it since the outcome is already fixed.
    /// Returns true when a word was applied, false when nothing was pending.
    pub fn resolve_pending(env: Env, admin_key: Address) -> Result<bool, Error> {
        let session = Self::load_session(&env, &admin_key)?;
        let request_id = match session.pending_request {
            Some(id) => id,
            None => return Ok(false),
        };
        if !Self::try_consume_pending(&env, request_id) {
            return Err(Error::RandomWordIsNotReadyYet);
        }
        Ok(true)
    }

    /// Resolve the caller's own session via membership.
    pub fn get_session(env: Env, player: Address) -> Result<Session, Error> {
        let admin_key = Self::lookup_membership(&env, &player)?;
        Self::load_session(&env, &admin_key)
    }

    /// Resolve a session directly by its admin key.
    pub fn get_session_helper(env: Env, admin_key: Address) -> Result<Session, Error> {
        Self::load_session(&env, &admin_key)
    }

    pub fn get_request(env: Env, request_id: u64) -> Option<RandomnessRequest> {
        Self::load_request(&env, request_id)
    }

    pub fn get_admin(env: Env) -> Address {
        env.storage().instance().get(&DataKey::Admin).unwrap()
    }

    pub fn get_provider(env: Env) -> Address {
        env.storage().instance().get(&DataKey::Provider).unwrap()
    }

    pub fn get_stake_token(env: Env) -> Address {
        env.storage().instance().get(&DataKey::StakeToken).unwrap()
    }

    pub fn get_min_session_price(env: Env) -> i128 {
        env.storage()
            .instance()
            .get(&DataKey::MinSessionPrice)
            .unwrap()
    }

    /// Applies to sessions created after the change.
    pub fn set_min_session_price(env: Env, min_session_price: i128) {
        let admin: Address = env.storage().instance().get(&DataKey::Admin).unwrap();
        admin.require_auth();
        env.storage()
            .instance()
            .set(&DataKey::MinSessionPrice, &min_session_price);
    }

    // --- Internals ---

    /// Open a request with the provider, record it, and mark it pending on
    /// the session. The caller stores the session afterwards.
    fn issue_request(env: &Env, session: &mut Session, purpose: RandomnessPurpose) -> u64 {
        let provider: Address = env.storage().instance().get(&DataKey::Provider).unwrap();
        let client = RandomnessProviderClient::new(env, &provider);
        let request_id = client.request_random(
            &env.current_contract_address(),
            &session.session_id,
            &purpose,
        );

        let record = RandomnessRequest {
            session_admin: session.admin.clone(),
            session_id: session.session_id,
            purpose,
            fulfilled: false,
            value: 0,
        };
        Self::store_request(env, request_id, &record);
        session.pending_request = Some(request_id);
        request_id
    }

    /// Poll the provider once for a pending request and apply the word if it
    /// is already available. Returns true when a word was applied.
    fn try_consume_pending(env: &Env, request_id: u64) -> bool {
        let provider: Address = env.storage().instance().get(&DataKey::Provider).unwrap();
        let client = RandomnessProviderClient::new(env, &provider);
        if !client.is_ready(&request_id) {
            return false;
        }
        let word = client.take_random(&request_id);
        Self::apply_random_word(env, request_id, word)
    }

    /// Apply a resolved word exactly once. Returns false when the word was
    /// ignored: unknown request, already fulfilled, or the session is gone,
    /// recreated, or no longer awaiting this request.
    fn apply_random_word(env: &Env, request_id: u64, word: u64) -> bool {
        let mut record = match Self::load_request(env, request_id) {
            Some(r) => r,
            None => return false,
        };
        if record.fulfilled {
            return false;
        }
        record.fulfilled = true;
        record.value = word;
        Self::store_request(env, request_id, &record);

        let mut session = match Self::load_session(env, &record.session_admin) {
            Ok(s) => s,
            Err(_) => return false,
        };
        if session.session_id != record.session_id {
            return false;
        }
        if session.pending_request != Some(request_id) {
            return false;
        }
        session.pending_request = None;

        match record.purpose {
            RandomnessPurpose::TurnAssignment => {
                session.whose_turn = (word % session.player_count as u64) as u32;
                Self::store_session(env, &record.session_admin, &session);

                TurnAssigned {
                    session_id: session.session_id,
                    whose_turn: session.whose_turn,
                }
                .publish(env);
            }
            RandomnessPurpose::DiceRoll => {
                Self::apply_dice_roll(env, &record.session_admin, &mut session, word);
            }
        }
        true
    }

    /// Advance the turn holder by a die face and settle the consequences:
    /// zone toll reporting, finish detection, turn rotation.
    fn apply_dice_roll(env: &Env, admin_key: &Address, session: &mut Session, word: u64) {
        let index = session.whose_turn;
        let player = session.players.get_unchecked(index);
        let face = board::die_face(word);
        let position = session.player_positions.get_unchecked(index) + face;
        session.player_positions.set(index, position);

        let zone = board::zone_of(position);
        let toll = board::toll_for(session.session_price, zone);

        DiceResolved {
            session_id: session.session_id,
            player: player.clone(),
            face,
            position,
            zone,
            tax: toll,
            rent: toll,
        }
        .publish(env);

        if position >= board::FINISH_LINE {
            Self::finish_session(env, admin_key, session, &player);
        } else {
            session.whose_turn = (session.whose_turn + 1) % session.player_count;
            Self::store_session(env, admin_key, session);
        }
    }

    /// The winner takes the whole pot. Memberships clear so every player is
    /// immediately free to create or join again; the record stays readable
    /// under the admin key until a new create overwrites it.
    fn finish_session(env: &Env, admin_key: &Address, session: &mut Session, winner: &Address) {
        session.status = SessionStatus::Finished;
        session.winner = Some(winner.clone());
        for i in 0..session.players.len() {
            let member = session.players.get_unchecked(i);
            Self::clear_membership(env, &member);
        }
        Self::store_session(env, admin_key, session);

        Self::release_stake(env, winner, session.pot);

        SessionFinished {
            session_id: session.session_id,
            winner: winner.clone(),
            pot: session.pot,
        }
        .publish(env);
    }

    fn dissolve_session(env: &Env, admin_key: &Address, session: &Session) -> Result<(), Error> {
        for i in 0..session.players.len() {
            let member = session.players.get_unchecked(i);
            Self::clear_membership(env, &member);
            Self::release_stake(env, &member, session.session_price);
        }
        env.storage()
            .persistent()
            .remove(&DataKey::Session(admin_key.clone()));

        SessionDissolved {
            session_id: session.session_id,
            admin: session.admin.clone(),
        }
        .publish(env);
        Ok(())
    }

    fn player_index(session: &Session, player: &Address) -> Option<u32> {
        session.players.first_index_of(player)
    }

    fn escrow_stake(env: &Env, from: &Address, amount: i128) {
        let token_addr: Address = env.storage().instance().get(&DataKey::StakeToken).unwrap();
        let token_client = token::Client::new(env, &token_addr);
        token_client.transfer(from, &env.current_contract_address(), &amount);
    }

    fn release_stake(env: &Env, to: &Address, amount: i128) {
        let token_addr: Address = env.storage().instance().get(&DataKey::StakeToken).unwrap();
        let token_client = token::Client::new(env, &token_addr);
        token_client.transfer(&env.current_contract_address(), to, &amount);
    }

    fn record_membership(env: &Env, player: &Address, admin_key: &Address) -> Result<(), Error> {
        let key = DataKey::Membership(player.clone());
        if env.storage().persistent().has(&key) {
            return Err(Error::PlayerAlreadyInSession);
        }
        env.storage().persistent().set(&key, admin_key);
        env.storage()
            .persistent()
            .extend_ttl(&key, STORAGE_TTL_LEDGERS, STORAGE_TTL_LEDGERS);
        Ok(())
    }

    fn clear_membership(env: &Env, player: &Address) {
        env.storage()
            .persistent()
            .remove(&DataKey::Membership(player.clone()));
    }

    fn lookup_membership(env: &Env, player: &Address) -> Result<Address, Error> {
        env.storage()
            .persistent()
            .get(&DataKey::Membership(player.clone()))
            .ok_or(Error::PlayerNotInSession)
    }

    fn load_session(env: &Env, admin_key: &Address) -> Result<Session, Error> {
        env.storage()
            .persistent()
            .get(&DataKey::Session(admin_key.clone()))
            .ok_or(Error::SessionNotFound)
    }

    fn store_session(env: &Env, admin_key: &Address, session: &Session) {
        let key = DataKey::Session(admin_key.clone());
        env.storage().persistent().set(&key, session);
        env.storage()
            .persistent()
            .extend_ttl(&key, STORAGE_TTL_LEDGERS, STORAGE_TTL_LEDGERS);
    }

    fn load_request(env: &Env, request_id: u64) -> Option<RandomnessRequest> {
        env.storage().persistent().get(&DataKey::Request(request_id))
    }

    fn store_request(env: &Env, request_id: u64, request: &RandomnessRequest) {
        let key = DataKey::Request(request_id);
        env.storage().persistent().set(&key, request);
        env.storage()
            .persistent()
            .extend_ttl(&key, STORAGE_TTL_LEDGERS, STORAGE_TTL_LEDGERS);
    }

    fn next_session_id(env: &Env) -> u32 {
        let id: u32 = env
            .storage()
            .instance()
            .get(&DataKey::NextSessionId)
            .unwrap_or(1);
        env.storage()
            .instance()
            .set(&DataKey::NextSessionId, &id.saturating_add(1));
        id
    }
}

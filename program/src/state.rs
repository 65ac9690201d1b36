// Recurring Raffle Program - State
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
    rent::Rent,
};

use crate::{
    error::RaffleError,
    vrf::{winner_index, RandomWord},
};

/// Random words requested from the coordinator for every round
pub const NUM_WORDS: u32 = 1;

/// Status of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    /// Round is open for entries
    Open,
    /// Round is closed and waiting for the coordinator to deliver randomness
    Resolving,
}

/// Program configuration account, written once by `Initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Randomness coordinator program
    pub coordinator: Pubkey,
    /// Coordinator key lane the request is billed against
    pub gas_lane: [u8; 32],
    /// Coordinator subscription paying for requests
    pub subscription_id: u64,
    /// Confirmations the coordinator waits for before answering
    pub request_confirmations: u16,
    /// Compute ceiling for the fulfillment callback
    pub callback_gas_limit: u32,
    /// Minimum payment per entry in lamports
    pub entrance_fee: u64,
    /// Minimum round length in seconds
    pub interval: u64,
    pub config_bump: u8,
    pub round_bump: u8,
}

impl Sealed for RaffleConfig {}

impl IsInitialized for RaffleConfig {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl RaffleConfig {
    pub fn entrance_fee(&self) -> u64 {
        self.entrance_fee
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn request_confirmations(&self) -> u16 {
        self.request_confirmations
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }

    /// Reject settings the round lifecycle cannot work with. The fee must
    /// cover the rent-exempt minimum of an empty account so any prize can
    /// land in a winner account that was drained to zero.
    pub fn validate(&self, rent: &Rent) -> Result<(), RaffleError> {
        if self.entrance_fee < rent.minimum_balance(0).max(1) {
            return Err(RaffleError::InvalidConfig);
        }
        if i64::try_from(self.interval).is_err() {
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }
}

impl Pack for RaffleConfig {
    const LEN: usize = 1 + 32 + 32 + 8 + 2 + 4 + 8 + 8 + 1 + 1;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, RaffleConfig::LEN];
        let (
            is_initialized,
            coordinator,
            gas_lane,
            subscription_id,
            request_confirmations,
            callback_gas_limit,
            entrance_fee,
            interval,
            config_bump,
            round_bump,
        ) = array_refs![src, 1, 32, 32, 8, 2, 4, 8, 8, 1, 1];

        let is_initialized = match is_initialized[0] {
            0 => false,
            1 => true,
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(RaffleConfig {
            is_initialized,
            coordinator: Pubkey::new_from_array(*coordinator),
            gas_lane: *gas_lane,
            subscription_id: u64::from_le_bytes(*subscription_id),
            request_confirmations: u16::from_le_bytes(*request_confirmations),
            callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
            entrance_fee: u64::from_le_bytes(*entrance_fee),
            interval: u64::from_le_bytes(*interval),
            config_bump: config_bump[0],
            round_bump: round_bump[0],
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, RaffleConfig::LEN];
        let (
            is_initialized_dst,
            coordinator_dst,
            gas_lane_dst,
            subscription_id_dst,
            request_confirmations_dst,
            callback_gas_limit_dst,
            entrance_fee_dst,
            interval_dst,
            config_bump_dst,
            round_bump_dst,
        ) = mut_array_refs![dst, 1, 32, 32, 8, 2, 4, 8, 8, 1, 1];

        is_initialized_dst[0] = self.is_initialized as u8;
        coordinator_dst.copy_from_slice(self.coordinator.as_ref());
        gas_lane_dst.copy_from_slice(&self.gas_lane);
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        *request_confirmations_dst = self.request_confirmations.to_le_bytes();
        *callback_gas_limit_dst = self.callback_gas_limit.to_le_bytes();
        *entrance_fee_dst = self.entrance_fee.to_le_bytes();
        *interval_dst = self.interval.to_le_bytes();
        config_bump_dst[0] = self.config_bump;
        round_bump_dst[0] = self.round_bump;
    }
}

/// Outcome of consuming delivered randomness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub winner: Pubkey,
    pub winner_index: u64,
    pub request_id: u64,
    /// Number of the round that was just resolved
    pub round_number: u64,
}

/// The single round aggregate. Funds are not tracked here: the held balance is
/// whatever the round account holds above its rent-exempt minimum.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Round {
    is_initialized: bool,
    state: RoundState,
    /// Entry order; the same player may appear several times
    participants: Vec<Pubkey>,
    /// When the current round was opened
    last_timestamp: UnixTimestamp,
    pending_request_id: Option<u64>,
    recent_winner: Option<Pubkey>,
    /// Rounds resolved so far
    round_number: u64,
}

impl Round {
    /// Serialized size with no participants, sized for the largest state
    pub const BASE_LEN: usize = 1 + 1 + 4 + 8 + (1 + 8) + (1 + 32) + 8;

    /// Account size needed to hold `players` entries
    pub fn space(players: usize) -> usize {
        Self::BASE_LEN + players * 32
    }

    pub fn new(now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            state: RoundState::Open,
            participants: Vec::new(),
            last_timestamp: now,
            pending_request_id: None,
            recent_winner: None,
            round_number: 0,
        }
    }

    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let round =
            Round::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)?;
        if !round.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(round)
    }

    pub fn load(round_info: &AccountInfo) -> Result<Self, ProgramError> {
        let data = round_info.try_borrow_data()?;
        Self::unpack(&data)
    }

    pub fn save(&self, round_info: &AccountInfo) -> ProgramResult {
        let mut data = round_info.try_borrow_mut_data()?;
        self.serialize(&mut &mut data[..])
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    /// Is this round ready to close?
    pub fn check_upkeep(&self, now: UnixTimestamp, interval: u64, balance: u64) -> bool {
        let time_passed = i64::try_from(interval)
            .map(|interval| now.saturating_sub(self.last_timestamp) >= interval)
            .unwrap_or(false);
        let is_open = self.state == RoundState::Open;
        let has_balance = balance > 0;
        let has_players = !self.participants.is_empty();

        time_passed && is_open && has_balance && has_players
    }

    /// Append an entry. Overpayment is kept; each entry is one more chance.
    pub fn record_entry(
        &mut self,
        player: Pubkey,
        paid: u64,
        entrance_fee: u64,
    ) -> Result<(), RaffleError> {
        if paid < entrance_fee {
            return Err(RaffleError::InsufficientPayment {
                paid,
                required: entrance_fee,
            });
        }
        if self.state != RoundState::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        self.participants.push(player);
        Ok(())
    }

    /// Close the round: re-check eligibility and move to `Resolving`.
    /// Must run before the coordinator is called.
    pub fn begin_resolution(
        &mut self,
        now: UnixTimestamp,
        interval: u64,
        balance: u64,
    ) -> Result<(), RaffleError> {
        if !self.check_upkeep(now, interval, balance) {
            return Err(RaffleError::UpkeepNotNeeded {
                balance,
                players: self.number_of_players(),
                state: self.state,
            });
        }
        self.state = RoundState::Resolving;
        Ok(())
    }

    pub fn record_request(&mut self, request_id: u64) -> Result<(), RaffleError> {
        if self.state != RoundState::Resolving {
            return Err(RaffleError::NoPendingRequest);
        }
        if self.pending_request_id.is_some() {
            return Err(RaffleError::RequestAlreadyRecorded);
        }
        self.pending_request_id = Some(request_id);
        Ok(())
    }

    /// Consume delivered randomness: pick the winner and reopen the round.
    /// Every field is reset here, before any funds move.
    pub fn settle(
        &mut self,
        request_id: u64,
        random_words: &[RandomWord],
        now: UnixTimestamp,
    ) -> Result<Settlement, RaffleError> {
        let pending = match (self.state, self.pending_request_id) {
            (RoundState::Resolving, Some(pending)) => pending,
            _ => return Err(RaffleError::NoPendingRequest),
        };
        if pending != request_id {
            return Err(RaffleError::RequestIdMismatch {
                pending,
                received: request_id,
            });
        }
        let word = random_words
            .first()
            .ok_or(RaffleError::MissingRandomWords)?;
        if self.participants.is_empty() {
            return Err(RaffleError::NoPendingRequest);
        }
        let next_round = self
            .round_number
            .checked_add(1)
            .ok_or(RaffleError::ArithmeticOverflow)?;

        let index = winner_index(word, self.number_of_players());
        let winner = self.participants[index as usize];
        let settlement = Settlement {
            winner,
            winner_index: index,
            request_id,
            round_number: self.round_number,
        };

        self.recent_winner = Some(winner);
        self.state = RoundState::Open;
        self.participants.clear();
        self.pending_request_id = None;
        self.last_timestamp = now;
        self.round_number = next_round;

        Ok(settlement)
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.participants.get(index)
    }

    pub fn players(&self) -> &[Pubkey] {
        &self.participants
    }

    pub fn number_of_players(&self) -> u64 {
        self.participants.len() as u64
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.last_timestamp
    }

    pub fn pending_request_id(&self) -> Option<u64> {
        self.pending_request_id
    }

    pub fn round_number(&self) -> u64 {
        self.round_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vrf::word_from_u64;

    const FEE: u64 = 10_000_000;
    const INTERVAL: u64 = 30;

    fn round_with(players: &[Pubkey]) -> Round {
        let mut round = Round::new(1_000);
        for player in players {
            round.record_entry(*player, FEE, FEE).unwrap();
        }
        round
    }

    fn keys(n: usize) -> Vec<Pubkey> {
        (0..n).map(|_| Pubkey::new_unique()).collect()
    }

    #[test]
    fn config_pack_round_trip() {
        let config = RaffleConfig {
            is_initialized: true,
            coordinator: Pubkey::new_unique(),
            gas_lane: [7; 32],
            subscription_id: 42,
            request_confirmations: 3,
            callback_gas_limit: 500_000,
            entrance_fee: FEE,
            interval: INTERVAL,
            config_bump: 254,
            round_bump: 253,
        };
        let mut data = vec![0u8; RaffleConfig::LEN];
        RaffleConfig::pack(config, &mut data).unwrap();
        assert_eq!(RaffleConfig::unpack(&data).unwrap(), config);
        assert_eq!(config.num_words(), 1);
    }

    #[test]
    fn zeroed_config_is_uninitialized() {
        let data = vec![0u8; RaffleConfig::LEN];
        assert_eq!(
            RaffleConfig::unpack(&data),
            Err(ProgramError::UninitializedAccount)
        );
    }

    #[test]
    fn config_validation() {
        let mut config = RaffleConfig {
            is_initialized: true,
            coordinator: Pubkey::new_unique(),
            gas_lane: [0; 32],
            subscription_id: 0,
            request_confirmations: 0,
            callback_gas_limit: 0,
            entrance_fee: FEE,
            interval: INTERVAL,
            config_bump: 0,
            round_bump: 0,
        };
        let rent = Rent::default();
        assert!(config.validate(&rent).is_ok());
        config.interval = u64::MAX;
        assert_eq!(config.validate(&rent), Err(RaffleError::InvalidConfig));
        config.interval = INTERVAL;
        config.entrance_fee = 0;
        assert_eq!(config.validate(&rent), Err(RaffleError::InvalidConfig));

        // Below what an empty winner account needs to stay rent exempt
        config.entrance_fee = rent.minimum_balance(0) - 1;
        assert_eq!(config.validate(&rent), Err(RaffleError::InvalidConfig));
        config.entrance_fee = rent.minimum_balance(0);
        assert!(config.validate(&rent).is_ok());
    }

    #[test]
    fn round_fits_its_space() {
        let players = keys(5);
        let mut round = round_with(&players);
        round.begin_resolution(1_000 + 30, INTERVAL, 5 * FEE).unwrap();
        round.record_request(u64::MAX).unwrap();
        round.recent_winner = Some(Pubkey::new_unique());

        let mut data = vec![0u8; Round::space(5)];
        let mut cursor = &mut data[..];
        round.serialize(&mut cursor).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(Round::unpack(&data).unwrap(), round);
    }

    #[test]
    fn unpack_ignores_trailing_capacity() {
        let round = round_with(&keys(2));
        let mut data = vec![0u8; Round::space(10)];
        round.serialize(&mut &mut data[..]).unwrap();
        assert_eq!(Round::unpack(&data).unwrap(), round);
    }

    #[test]
    fn entry_requires_fee() {
        let mut round = Round::new(0);
        let player = Pubkey::new_unique();
        assert_eq!(
            round.record_entry(player, FEE - 1, FEE),
            Err(RaffleError::InsufficientPayment {
                paid: FEE - 1,
                required: FEE
            })
        );
        assert_eq!(round.number_of_players(), 0);

        round.record_entry(player, FEE * 3, FEE).unwrap();
        round.record_entry(player, FEE, FEE).unwrap();
        assert_eq!(round.number_of_players(), 2);
        assert_eq!(round.player(0), Some(&player));
        assert_eq!(round.player(1), Some(&player));
        assert_eq!(round.player(2), None);
    }

    #[test]
    fn entry_rejected_while_resolving() {
        let mut round = round_with(&keys(1));
        round.begin_resolution(1_030, INTERVAL, FEE).unwrap();
        assert_eq!(
            round.record_entry(Pubkey::new_unique(), FEE, FEE),
            Err(RaffleError::RoundNotOpen)
        );
        assert_eq!(round.number_of_players(), 1);
    }

    #[test]
    fn upkeep_waits_for_interval() {
        let round = round_with(&keys(3));
        let balance = 3 * FEE;
        assert!(!round.check_upkeep(1_000, INTERVAL, balance));
        assert!(!round.check_upkeep(1_029, INTERVAL, balance));
        assert!(round.check_upkeep(1_030, INTERVAL, balance));
        assert!(round.check_upkeep(5_000, INTERVAL, balance));
    }

    #[test]
    fn upkeep_needs_players_and_balance() {
        let empty = Round::new(1_000);
        assert!(!empty.check_upkeep(2_000, INTERVAL, FEE));

        let round = round_with(&keys(1));
        assert!(!round.check_upkeep(2_000, INTERVAL, 0));
        assert!(round.check_upkeep(2_000, INTERVAL, 1));
    }

    #[test]
    fn second_close_fails_with_diagnostics() {
        let mut round = round_with(&keys(2));
        round.begin_resolution(1_030, INTERVAL, 2 * FEE).unwrap();
        round.record_request(9).unwrap();
        assert_eq!(
            round.begin_resolution(1_030, INTERVAL, 2 * FEE),
            Err(RaffleError::UpkeepNotNeeded {
                balance: 2 * FEE,
                players: 2,
                state: RoundState::Resolving,
            })
        );
        assert_eq!(round.pending_request_id(), Some(9));
        assert_eq!(round.record_request(10), Err(RaffleError::RequestAlreadyRecorded));
    }

    #[test]
    fn close_before_interval_is_rejected() {
        let mut round = round_with(&keys(1));
        assert_eq!(
            round.begin_resolution(1_010, INTERVAL, FEE),
            Err(RaffleError::UpkeepNotNeeded {
                balance: FEE,
                players: 1,
                state: RoundState::Open,
            })
        );
        assert_eq!(round.state(), RoundState::Open);
    }

    #[test]
    fn settle_picks_modulo_and_reopens() {
        let players = keys(20);
        let mut round = round_with(&players);
        round.begin_resolution(1_030, INTERVAL, 20 * FEE).unwrap();
        round.record_request(77).unwrap();

        let settlement = round.settle(77, &[word_from_u64(52)], 2_000).unwrap();
        assert_eq!(settlement.winner_index, 12);
        assert_eq!(settlement.winner, players[12]);
        assert_eq!(settlement.round_number, 0);

        assert_eq!(round.state(), RoundState::Open);
        assert_eq!(round.number_of_players(), 0);
        assert_eq!(round.pending_request_id(), None);
        assert_eq!(round.recent_winner(), Some(players[12]));
        assert_eq!(round.last_timestamp(), 2_000);
        assert_eq!(round.round_number(), 1);

        round.record_entry(Pubkey::new_unique(), FEE, FEE).unwrap();
        assert_eq!(round.number_of_players(), 1);
    }

    #[test]
    fn settle_rejects_foreign_or_stale_requests() {
        let mut round = round_with(&keys(3));
        assert_eq!(
            round.settle(1, &[word_from_u64(1)], 2_000),
            Err(RaffleError::NoPendingRequest)
        );

        round.begin_resolution(1_030, INTERVAL, 3 * FEE).unwrap();
        assert_eq!(
            round.settle(1, &[word_from_u64(1)], 2_000),
            Err(RaffleError::NoPendingRequest)
        );

        round.record_request(5).unwrap();
        let before = round.clone();
        assert_eq!(
            round.settle(6, &[word_from_u64(1)], 2_000),
            Err(RaffleError::RequestIdMismatch {
                pending: 5,
                received: 6
            })
        );
        assert_eq!(round.settle(5, &[], 2_000), Err(RaffleError::MissingRandomWords));
        assert_eq!(round, before);

        round.settle(5, &[word_from_u64(1)], 2_000).unwrap();
        assert_eq!(
            round.settle(5, &[word_from_u64(1)], 2_001),
            Err(RaffleError::NoPendingRequest)
        );
    }

    #[test]
    fn duplicate_entries_weight_selection() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let mut round = round_with(&[alice, alice, bob]);
        round.begin_resolution(1_030, INTERVAL, 3 * FEE).unwrap();
        round.record_request(1).unwrap();
        let settlement = round.settle(1, &[word_from_u64(4)], 1_030).unwrap();
        assert_eq!(settlement.winner, alice);
    }
}

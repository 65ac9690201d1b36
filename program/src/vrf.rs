// Randomness coordinator integration for the recurring raffle
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{get_return_data, invoke},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    error::RaffleError,
    state::{RaffleConfig, NUM_WORDS},
};

/// Seed of the coordinator PDA that signs fulfillments
pub const COORDINATOR_AUTHORITY_SEED: &[u8] = b"coordinator";

/// One delivered random value, a big-endian 256-bit integer
pub type RandomWord = [u8; 32];

/// Parameters of a randomness request
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

impl RandomnessRequest {
    pub fn from_config(config: &RaffleConfig) -> Self {
        Self {
            key_hash: config.gas_lane,
            subscription_id: config.subscription_id,
            request_confirmations: config.request_confirmations,
            callback_gas_limit: config.callback_gas_limit,
            num_words: NUM_WORDS,
        }
    }
}

/// Instructions understood by the coordinator program
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum CoordinatorInstruction {
    /// Request random words for the consumer account
    ///
    /// Accounts expected:
    /// 0. `[]` The consumer (round) account
    /// Remaining accounts are coordinator specific
    RequestRandomWords(RandomnessRequest),
}

/// Anything that can issue a randomness request and hand back its id
pub trait RandomnessRequester {
    fn request_random_words(&self, request: &RandomnessRequest) -> Result<u64, ProgramError>;
}

/// Requests randomness through a CPI into the coordinator program. The request
/// id comes back as the coordinator's return data.
pub struct CoordinatorCpi<'a, 'info> {
    coordinator_program: &'a AccountInfo<'info>,
    consumer: &'a AccountInfo<'info>,
    remaining_accounts: &'a [AccountInfo<'info>],
}

impl<'a, 'info> CoordinatorCpi<'a, 'info> {
    pub fn new(
        coordinator_program: &'a AccountInfo<'info>,
        consumer: &'a AccountInfo<'info>,
        remaining_accounts: &'a [AccountInfo<'info>],
    ) -> Self {
        Self {
            coordinator_program,
            consumer,
            remaining_accounts,
        }
    }
}

impl<'a, 'info> RandomnessRequester for CoordinatorCpi<'a, 'info> {
    fn request_random_words(&self, request: &RandomnessRequest) -> Result<u64, ProgramError> {
        let data = CoordinatorInstruction::RequestRandomWords(request.clone())
            .try_to_vec()
            .map_err(|_| ProgramError::InvalidInstructionData)?;

        let mut metas = vec![AccountMeta::new_readonly(*self.consumer.key, false)];
        let mut infos = vec![self.consumer.clone()];
        for account in self.remaining_accounts {
            metas.push(AccountMeta {
                pubkey: *account.key,
                is_signer: account.is_signer,
                is_writable: account.is_writable,
            });
            infos.push(account.clone());
        }
        infos.push(self.coordinator_program.clone());

        invoke(
            &Instruction {
                program_id: *self.coordinator_program.key,
                accounts: metas,
                data,
            },
            &infos,
        )?;

        let (program_id, return_data) = get_return_data().ok_or_else(|| {
            msg!("Coordinator returned no request id");
            RaffleError::MalformedRequestId
        })?;
        if program_id != *self.coordinator_program.key {
            msg!("Return data came from {}, not the coordinator", program_id);
            return Err(RaffleError::MalformedRequestId.into());
        }
        decode_request_id(&return_data).map_err(Into::into)
    }
}

/// Request ids are returned as exactly 8 little-endian bytes
pub fn decode_request_id(data: &[u8]) -> Result<u64, RaffleError> {
    <[u8; 8]>::try_from(data)
        .map(u64::from_le_bytes)
        .map_err(|_| RaffleError::MalformedRequestId)
}

/// Address that must sign every fulfillment from `coordinator`
pub fn find_coordinator_authority(coordinator: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[COORDINATOR_AUTHORITY_SEED], coordinator)
}

/// Index of the winning entry: `word mod players`, computed over the full
/// 256-bit word. `players` must be non-zero.
pub fn winner_index(word: &RandomWord, players: u64) -> u64 {
    let modulus = players as u128;
    word.iter()
        .fold(0u128, |acc, byte| ((acc << 8) | *byte as u128) % modulus) as u64
}

/// Word holding `value` in its low 64 bits
pub fn word_from_u64(value: u64) -> RandomWord {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

// Recurring Raffle Program - Instructions
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::{
    error::RaffleError,
    utils::{find_config_address, find_round_address},
    vrf::{find_coordinator_authority, RandomWord},
};

/// Settings fixed for the lifetime of the raffle
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RaffleSettings {
    /// Minimum payment per entry in lamports. Must be at least the
    /// rent-exempt minimum of an empty account.
    pub entrance_fee: u64,
    /// Minimum round length in seconds
    pub interval: u64,
    /// Coordinator key lane
    pub gas_lane: [u8; 32],
    /// Coordinator subscription paying for requests
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleInstruction {
    /// Create the config and round accounts and open the first round.
    /// Either address may already hold lamports.
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The payer funding both accounts
    /// 1. `[writable]` The config account (PDA)
    /// 2. `[writable]` The round account (PDA)
    /// 3. `[]` The randomness coordinator program
    /// 4. `[]` The system program
    Initialize(RaffleSettings),

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player
    /// 1. `[]` The config account
    /// 2. `[writable]` The round account
    /// 3. `[]` The system program
    EnterRaffle {
        /// Lamports paid, at least the entrance fee
        amount: u64,
    },

    /// Report whether the round can be closed. Sets return data to the
    /// borsh-encoded `(bool, Vec<u8>)`.
    ///
    /// Accounts expected:
    /// 0. `[]` The config account
    /// 1. `[]` The round account
    CheckUpkeep { check_data: Vec<u8> },

    /// Close the round and request randomness. Anyone may call this.
    ///
    /// Accounts expected:
    /// 0. `[]` The config account
    /// 1. `[writable]` The round account
    /// 2. `[]` The randomness coordinator program
    /// Remaining accounts are forwarded to the coordinator
    PerformUpkeep { perform_data: Vec<u8> },

    /// Deliver randomness for the pending request and pay the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` The coordinator authority (PDA of the coordinator)
    /// 1. `[]` The config account
    /// 2. `[writable]` The round account
    /// 3. `[writable]` The winner
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<RandomWord>,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| RaffleError::InvalidInstruction.into())
    }
}

/// Create initialize instruction
pub fn initialize(
    program_id: &Pubkey,
    payer: &Pubkey,
    coordinator: &Pubkey,
    settings: RaffleSettings,
) -> Instruction {
    let (config, _) = find_config_address(program_id);
    let (round, _) = find_round_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &RaffleInstruction::Initialize(settings),
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(config, false),
            AccountMeta::new(round, false),
            AccountMeta::new_readonly(*coordinator, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create enter_raffle instruction
pub fn enter_raffle(program_id: &Pubkey, player: &Pubkey, amount: u64) -> Instruction {
    let (config, _) = find_config_address(program_id);
    let (round, _) = find_round_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &RaffleInstruction::EnterRaffle { amount },
        vec![
            AccountMeta::new(*player, true),
            AccountMeta::new_readonly(config, false),
            AccountMeta::new(round, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
    )
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, check_data: Vec<u8>) -> Instruction {
    let (config, _) = find_config_address(program_id);
    let (round, _) = find_round_address(program_id);
    Instruction::new_with_borsh(
        *program_id,
        &RaffleInstruction::CheckUpkeep { check_data },
        vec![
            AccountMeta::new_readonly(config, false),
            AccountMeta::new_readonly(round, false),
        ],
    )
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(
    program_id: &Pubkey,
    coordinator: &Pubkey,
    perform_data: Vec<u8>,
    coordinator_accounts: &[AccountMeta],
) -> Instruction {
    let (config, _) = find_config_address(program_id);
    let (round, _) = find_round_address(program_id);
    let mut accounts = vec![
        AccountMeta::new_readonly(config, false),
        AccountMeta::new(round, false),
        AccountMeta::new_readonly(*coordinator, false),
    ];
    accounts.extend_from_slice(coordinator_accounts);
    Instruction::new_with_borsh(
        *program_id,
        &RaffleInstruction::PerformUpkeep { perform_data },
        accounts,
    )
}

/// Create fulfill_random_words instruction. The coordinator signs it through
/// its authority PDA; `winner` is the entry selected by the first word.
pub fn fulfill_random_words(
    program_id: &Pubkey,
    coordinator: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: Vec<RandomWord>,
) -> Instruction {
    let (config, _) = find_config_address(program_id);
    let (round, _) = find_round_address(program_id);
    let (authority, _) = find_coordinator_authority(coordinator);
    Instruction::new_with_borsh(
        *program_id,
        &RaffleInstruction::FulfillRandomWords {
            request_id,
            random_words,
        },
        vec![
            AccountMeta::new_readonly(authority, true),
            AccountMeta::new_readonly(config, false),
            AccountMeta::new(round, false),
            AccountMeta::new(*winner, false),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_rejects_garbage() {
        assert_eq!(
            RaffleInstruction::unpack(&[]),
            Err(ProgramError::Custom(RaffleError::InvalidInstruction.code()))
        );
        assert_eq!(
            RaffleInstruction::unpack(&[42, 1, 2]),
            Err(ProgramError::Custom(RaffleError::InvalidInstruction.code()))
        );
    }

    #[test]
    fn builders_encode_instruction() {
        let program_id = Pubkey::new_unique();
        let player = Pubkey::new_unique();
        let ix = enter_raffle(&program_id, &player, 25);
        assert_eq!(
            RaffleInstruction::unpack(&ix.data).unwrap(),
            RaffleInstruction::EnterRaffle { amount: 25 }
        );
        assert_eq!(ix.accounts[0].pubkey, player);
        assert!(ix.accounts[0].is_signer);
        assert!(ix.accounts[2].is_writable);

        let coordinator = Pubkey::new_unique();
        let ix = fulfill_random_words(&program_id, &coordinator, &player, 3, vec![[1; 32]]);
        assert_eq!(ix.accounts[0].pubkey, find_coordinator_authority(&coordinator).0);
        assert!(ix.accounts[0].is_signer);
        assert_eq!(ix.accounts[3].pubkey, player);
    }
}

// Recurring Raffle Program
// Players pay a fixed fee to enter; once the interval has passed anyone can close
// the round, a randomness coordinator answers asynchronously, and the whole pot
// goes to one entry before the next round opens.

pub mod error;
pub mod events;
pub mod instruction;
pub mod lifecycle;
pub mod payout;
pub mod processor;
pub mod state;
pub mod utils;
pub mod vrf;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

#[cfg(not(feature = "no-entrypoint"))]
solana_program::entrypoint!(process_instruction);

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}

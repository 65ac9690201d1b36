use solana_program::{account_info::AccountInfo, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::error::RaffleError;

/// Moves the prize to the winner
pub trait PayoutSink {
    fn transfer(&mut self, winner: &Pubkey, amount: u64) -> Result<(), ProgramError>;
}

/// Pays out of a program-owned vault by moving lamports directly
pub struct LamportPayout<'a, 'info> {
    vault: &'a AccountInfo<'info>,
    recipient: &'a AccountInfo<'info>,
}

impl<'a, 'info> LamportPayout<'a, 'info> {
    pub fn new(vault: &'a AccountInfo<'info>, recipient: &'a AccountInfo<'info>) -> Self {
        Self { vault, recipient }
    }
}

impl<'a, 'info> PayoutSink for LamportPayout<'a, 'info> {
    fn transfer(&mut self, winner: &Pubkey, amount: u64) -> Result<(), ProgramError> {
        if self.recipient.key != winner {
            msg!(
                "Recipient {} is not the selected winner {}",
                self.recipient.key,
                winner
            );
            return Err(RaffleError::PayoutTransferFailed.into());
        }
        if !self.recipient.is_writable {
            msg!("Winner account {} is not writable", winner);
            return Err(RaffleError::PayoutTransferFailed.into());
        }

        let vault_lamports = self
            .vault
            .lamports()
            .checked_sub(amount)
            .ok_or(RaffleError::PayoutTransferFailed)?;
        let recipient_lamports = self
            .recipient
            .lamports()
            .checked_add(amount)
            .ok_or(RaffleError::ArithmeticOverflow)?;

        **self.vault.try_borrow_mut_lamports()? = vault_lamports;
        **self.recipient.try_borrow_mut_lamports()? = recipient_lamports;
        Ok(())
    }
}

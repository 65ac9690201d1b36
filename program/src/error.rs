// Recurring Raffle Program - Errors
use solana_program::{decode_error::DecodeError, msg, program_error::ProgramError};
use thiserror::Error;

use crate::state::RoundState;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstruction,

    /// Paid amount is below the entrance fee
    #[error("Insufficient payment: paid {paid} lamports, entrance fee is {required}")]
    InsufficientPayment { paid: u64, required: u64 },

    /// Entries are only accepted while the round is open
    #[error("Round is not open for entries")]
    RoundNotOpen,

    #[error("Upkeep not needed (balance: {balance}, players: {players}, state: {state:?})")]
    UpkeepNotNeeded {
        balance: u64,
        players: u64,
        state: RoundState,
    },

    /// No randomness request is outstanding for this round
    #[error("No randomness request is pending")]
    NoPendingRequest,

    /// The fulfilled request id is not the one this round is waiting for
    #[error("Request id {received} does not match pending request {pending}")]
    RequestIdMismatch { pending: u64, received: u64 },

    #[error("Only the coordinator can fulfill randomness requests")]
    OnlyCoordinatorCanFulfill,

    #[error("Randomness fulfillment carried no random words")]
    MissingRandomWords,

    /// The winner could not be paid; the round stays resolving
    #[error("Payout transfer to the winner failed")]
    PayoutTransferFailed,

    #[error("Invalid raffle configuration")]
    InvalidConfig,

    #[error("Coordinator returned a malformed request id")]
    MalformedRequestId,

    #[error("A request id is already recorded for this round")]
    RequestAlreadyRecorded,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl RaffleError {
    /// Stable custom error code reported to clients
    pub fn code(&self) -> u32 {
        match self {
            RaffleError::InvalidInstruction => 0,
            RaffleError::InsufficientPayment { .. } => 1,
            RaffleError::RoundNotOpen => 2,
            RaffleError::UpkeepNotNeeded { .. } => 3,
            RaffleError::NoPendingRequest => 4,
            RaffleError::RequestIdMismatch { .. } => 5,
            RaffleError::OnlyCoordinatorCanFulfill => 6,
            RaffleError::MissingRandomWords => 7,
            RaffleError::PayoutTransferFailed => 8,
            RaffleError::InvalidConfig => 9,
            RaffleError::MalformedRequestId => 10,
            RaffleError::RequestAlreadyRecorded => 11,
            RaffleError::ArithmeticOverflow => 12,
        }
    }
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        msg!("Error: {}", e);
        ProgramError::Custom(e.code())
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            ProgramError::from(RaffleError::RoundNotOpen),
            ProgramError::Custom(2)
        );
        assert_eq!(
            ProgramError::from(RaffleError::UpkeepNotNeeded {
                balance: 0,
                players: 0,
                state: RoundState::Resolving,
            }),
            ProgramError::Custom(3)
        );
        assert_eq!(
            ProgramError::from(RaffleError::PayoutTransferFailed),
            ProgramError::Custom(8)
        );
    }

    #[test]
    fn upkeep_error_describes_round() {
        let err = RaffleError::UpkeepNotNeeded {
            balance: 30,
            players: 3,
            state: RoundState::Open,
        };
        assert_eq!(
            err.to_string(),
            "Upkeep not needed (balance: 30, players: 3, state: Open)"
        );
    }
}

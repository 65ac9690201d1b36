// Notifications for off-chain indexers
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    EntryAccepted {
        player: Pubkey,
    },
    ResolutionRequested {
        request_id: u64,
    },
    WinnerPicked {
        winner: Pubkey,
        prize: u64,
        round_number: u64,
    },
}

impl RaffleEvent {
    /// Log a readable line and the borsh-encoded event
    pub fn emit(&self) {
        match self {
            RaffleEvent::EntryAccepted { player } => msg!("EntryAccepted: {}", player),
            RaffleEvent::ResolutionRequested { request_id } => {
                msg!("ResolutionRequested: {}", request_id)
            }
            RaffleEvent::WinnerPicked {
                winner,
                prize,
                round_number,
            } => msg!(
                "WinnerPicked: {} won {} lamports in round {}",
                winner,
                prize,
                round_number
            ),
        }
        if let Ok(data) = self.try_to_vec() {
            sol_log_data(&[&data]);
        }
    }
}

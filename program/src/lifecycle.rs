// Two-phase round resolution: close + request, then settle + pay out
use solana_program::{
    clock::UnixTimestamp, entrypoint::ProgramResult, msg, program_error::ProgramError,
};

use crate::{
    error::RaffleError,
    events::RaffleEvent,
    payout::PayoutSink,
    state::{RaffleConfig, Round, Settlement},
    vrf::{RandomWord, RandomnessRequest, RandomnessRequester},
};

/// Close an eligible round and issue exactly one randomness request.
///
/// The `Resolving` state is persisted before the coordinator is called, so a
/// second close observes it and fails. If the request fails the round is put
/// back the way it was.
pub fn close_round<R, F>(
    round: &mut Round,
    config: &RaffleConfig,
    now: UnixTimestamp,
    balance: u64,
    requester: &R,
    mut persist: F,
) -> Result<u64, ProgramError>
where
    R: RandomnessRequester + ?Sized,
    F: FnMut(&Round) -> ProgramResult,
{
    let snapshot = round.clone();
    round.begin_resolution(now, config.interval, balance)?;
    persist(round)?;
    msg!(
        "Round {} closed: {} players, {} lamports",
        round.round_number(),
        round.number_of_players(),
        balance
    );

    let request_id = match requester.request_random_words(&RandomnessRequest::from_config(config)) {
        Ok(request_id) => request_id,
        Err(err) => {
            msg!("Randomness request failed, reopening round");
            *round = snapshot;
            persist(round)?;
            return Err(err);
        }
    };
    round.record_request(request_id)?;
    persist(round)?;

    RaffleEvent::ResolutionRequested { request_id }.emit();
    Ok(request_id)
}

/// Consume delivered randomness, reset the round, then pay `prize` to the winner.
///
/// The reset round is persisted before the payout, so anything the transfer
/// triggers sees an open, empty round. A failed payout restores the resolving
/// round untouched and fails the whole resolution.
pub fn resolve_round<P, F>(
    round: &mut Round,
    request_id: u64,
    random_words: &[RandomWord],
    now: UnixTimestamp,
    prize: u64,
    payout: &mut P,
    mut persist: F,
) -> Result<Settlement, ProgramError>
where
    P: PayoutSink + ?Sized,
    F: FnMut(&Round) -> ProgramResult,
{
    let snapshot = round.clone();
    let settlement = round.settle(request_id, random_words, now)?;
    persist(round)?;
    msg!(
        "Request {} picked entry {} of round {}",
        request_id,
        settlement.winner_index,
        settlement.round_number
    );

    if let Err(err) = payout.transfer(&settlement.winner, prize) {
        msg!("Payout to {} failed: {:?}", settlement.winner, err);
        *round = snapshot;
        persist(round)?;
        return Err(RaffleError::PayoutTransferFailed.into());
    }

    RaffleEvent::WinnerPicked {
        winner: settlement.winner,
        prize,
        round_number: settlement.round_number,
    }
    .emit();
    Ok(settlement)
}

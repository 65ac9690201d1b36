// Recurring Raffle Program - Instruction Processor
use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

use crate::{
    error::RaffleError,
    events::RaffleEvent,
    instruction::{RaffleInstruction, RaffleSettings},
    lifecycle,
    payout::LamportPayout,
    state::{RaffleConfig, Round},
    utils::{
        create_pda_account, find_config_address, find_round_address, held_balance,
        lamports_to_sol, CONFIG_SEED, ROUND_SEED,
    },
    vrf::{find_coordinator_authority, CoordinatorCpi, RandomWord},
};

/// Program state handler.
pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Initialize(settings) => {
                msg!("Instruction: Initialize");
                Self::process_initialize(program_id, accounts, settings)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(program_id, accounts, amount)
            }
            RaffleInstruction::CheckUpkeep { check_data } => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(program_id, accounts, check_data)
            }
            RaffleInstruction::PerformUpkeep { perform_data } => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(program_id, accounts, perform_data)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(program_id, accounts, request_id, random_words)
            }
        }
    }

    /// Creates the config and round accounts. Only called once.
    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        settings: RaffleSettings,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !payer_info.is_signer {
            msg!("Payer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_config_pubkey, config_bump) = find_config_address(program_id);
        if *config_info.key != expected_config_pubkey {
            msg!("Invalid config account address");
            return Err(ProgramError::InvalidArgument);
        }
        let (expected_round_pubkey, round_bump) = find_round_address(program_id);
        if *round_info.key != expected_round_pubkey {
            msg!("Invalid round account address");
            return Err(ProgramError::InvalidArgument);
        }
        if config_info.owner == program_id || round_info.owner == program_id {
            msg!("Raffle is already initialized");
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        let config = RaffleConfig {
            is_initialized: true,
            coordinator: *coordinator_info.key,
            gas_lane: settings.gas_lane,
            subscription_id: settings.subscription_id,
            request_confirmations: settings.request_confirmations,
            callback_gas_limit: settings.callback_gas_limit,
            entrance_fee: settings.entrance_fee,
            interval: settings.interval,
            config_bump,
            round_bump,
        };
        let rent = Rent::get()?;
        config.validate(&rent)?;

        create_pda_account(
            payer_info,
            config_info,
            system_program_info,
            &rent,
            RaffleConfig::LEN,
            program_id,
            &[CONFIG_SEED, &[config_bump]],
        )?;
        create_pda_account(
            payer_info,
            round_info,
            system_program_info,
            &rent,
            Round::space(0),
            program_id,
            &[ROUND_SEED, &[round_bump]],
        )?;

        RaffleConfig::pack(config, &mut config_info.data.borrow_mut())?;

        let now = Clock::get()?.unix_timestamp;
        Round::new(now).save(round_info)?;

        msg!(
            "Raffle initialized: Fee={} SOL, Interval={}s, Coordinator={}",
            lamports_to_sol(config.entrance_fee),
            config.interval,
            config.coordinator
        );
        Ok(())
    }

    fn process_enter_raffle(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        amount: u64,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let config = Self::load_config(program_id, config_info)?;
        let mut round = Self::load_round(program_id, round_info)?;
        round.record_entry(*player_info.key, amount, config.entrance_fee)?;

        // The entrant pays for any extra space their entry needs, so the
        // held balance grows by exactly `amount`.
        let rent = Rent::get()?;
        let current_len = round_info.data_len();
        let required_len = Round::space(round.number_of_players() as usize);
        let rent_top_up = if required_len > current_len {
            rent.minimum_balance(required_len)
                .saturating_sub(rent.minimum_balance(current_len))
        } else {
            0
        };
        let total = amount
            .checked_add(rent_top_up)
            .ok_or(RaffleError::ArithmeticOverflow)?;

        invoke(
            &system_instruction::transfer(player_info.key, round_info.key, total),
            &[
                player_info.clone(),
                round_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        if required_len > current_len {
            round_info.realloc(required_len, false)?;
        }
        round.save(round_info)?;

        msg!(
            "Entry {} accepted: {} lamports",
            round.number_of_players(),
            amount
        );
        RaffleEvent::EntryAccepted {
            player: *player_info.key,
        }
        .emit();
        Ok(())
    }

    /// Read-only: never fails because the round is not ready
    fn process_check_upkeep(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        check_data: Vec<u8>,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;

        let config = Self::load_config(program_id, config_info)?;
        let round = Self::load_round(program_id, round_info)?;
        let balance = held_balance(round_info, &Rent::get()?);
        let now = Clock::get()?.unix_timestamp;

        let upkeep_needed = round.check_upkeep(now, config.interval, balance);
        msg!(
            "Upkeep needed: {} (balance {}, players {}, state {:?})",
            upkeep_needed,
            balance,
            round.number_of_players(),
            round.state()
        );

        let result = (upkeep_needed, check_data)
            .try_to_vec()
            .map_err(|_| ProgramError::InvalidInstructionData)?;
        set_return_data(&result);
        Ok(())
    }

    fn process_perform_upkeep(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        _perform_data: Vec<u8>,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let coordinator_accounts = account_info_iter.as_slice();

        let config = Self::load_config(program_id, config_info)?;
        let mut round = Self::load_round(program_id, round_info)?;

        if *coordinator_info.key != config.coordinator {
            msg!("Coordinator program does not match the configured one");
            return Err(ProgramError::IncorrectProgramId);
        }

        let balance = held_balance(round_info, &Rent::get()?);
        let now = Clock::get()?.unix_timestamp;

        let requester = CoordinatorCpi::new(coordinator_info, round_info, coordinator_accounts);
        let request_id =
            lifecycle::close_round(&mut round, &config, now, balance, &requester, |round| {
                round.save(round_info)
            })?;

        msg!("Randomness requested: request id {}", request_id);
        Ok(())
    }

    fn process_fulfill_random_words(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: Vec<RandomWord>,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let authority_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let config = Self::load_config(program_id, config_info)?;

        let (expected_authority, _) = find_coordinator_authority(&config.coordinator);
        if !authority_info.is_signer || *authority_info.key != expected_authority {
            msg!("Fulfillment not signed by the coordinator authority {}", expected_authority);
            return Err(RaffleError::OnlyCoordinatorCanFulfill.into());
        }

        let mut round = Self::load_round(program_id, round_info)?;
        let prize = held_balance(round_info, &Rent::get()?);
        let now = Clock::get()?.unix_timestamp;

        let mut payout = LamportPayout::new(round_info, winner_info);
        let settlement = lifecycle::resolve_round(
            &mut round,
            request_id,
            &random_words,
            now,
            prize,
            &mut payout,
            |round| round.save(round_info),
        )?;

        msg!(
            "Round {} resolved: {} won {} SOL",
            settlement.round_number,
            settlement.winner,
            lamports_to_sol(prize)
        );
        Ok(())
    }

    fn load_config(
        program_id: &Pubkey,
        config_info: &AccountInfo,
    ) -> Result<RaffleConfig, ProgramError> {
        if config_info.owner != program_id {
            msg!("Config account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let (expected_config_pubkey, _) = find_config_address(program_id);
        if *config_info.key != expected_config_pubkey {
            msg!("Invalid config account address");
            return Err(ProgramError::InvalidArgument);
        }
        RaffleConfig::unpack(&config_info.data.borrow())
    }

    fn load_round(program_id: &Pubkey, round_info: &AccountInfo) -> Result<Round, ProgramError> {
        if round_info.owner != program_id {
            msg!("Round account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let (expected_round_pubkey, _) = find_round_address(program_id);
        if *round_info.key != expected_round_pubkey {
            msg!("Invalid round account address");
            return Err(ProgramError::InvalidArgument);
        }
        Round::load(round_info)
    }
}

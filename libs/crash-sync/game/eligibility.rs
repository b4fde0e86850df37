//! Action eligibility and derived display values
//!
//! Pure functions of the current state: nothing here mutates, so the front end
//! may call them on every render and the reconciler calls the same checks
//! again right before sending an intent.

use crate::core::connection_state::ConnectionStatus;
use crate::error::UserInputError;
use crate::game::state::{GamePhase, GameState, PendingActions, PlayerState};

/// Why a bet may not be placed right now, checked in the order the player
/// is most likely to be able to fix it.
pub fn check_place_bet(
    game: Option<&GameState>,
    player: &PlayerState,
    pending: &PendingActions,
    bet_amount: f64,
    status: ConnectionStatus,
) -> Result<(), UserInputError> {
    if !status.is_connected() {
        return Err(UserInputError::NotConnected);
    }
    if player.has_active_bet() {
        return Err(UserInputError::BetAlreadyActive);
    }
    if pending.is_placing_bet {
        return Err(UserInputError::BetInFlight);
    }
    match game.map(|g| g.phase) {
        Some(GamePhase::Waiting) => {}
        Some(phase) => return Err(UserInputError::BettingClosed(phase.to_string())),
        None => return Err(UserInputError::BettingClosed("loading".to_string())),
    }
    if !(bet_amount.is_finite() && bet_amount > 0.0 && bet_amount <= player.balance) {
        return Err(UserInputError::InvalidAmount);
    }
    Ok(())
}

pub fn check_cash_out(
    game: Option<&GameState>,
    player: &PlayerState,
    pending: &PendingActions,
    status: ConnectionStatus,
) -> Result<(), UserInputError> {
    if !status.is_connected() {
        return Err(UserInputError::NotConnected);
    }
    if !player.has_active_bet() {
        return Err(UserInputError::NoActiveBet);
    }
    if pending.is_cashing_out {
        return Err(UserInputError::CashOutInFlight);
    }
    match game.map(|g| g.phase) {
        Some(GamePhase::Playing) => Ok(()),
        Some(phase) => Err(UserInputError::CashOutClosed(phase.to_string())),
        None => Err(UserInputError::CashOutClosed("loading".to_string())),
    }
}

#[inline]
pub fn can_place_bet(
    game: Option<&GameState>,
    player: &PlayerState,
    pending: &PendingActions,
    bet_amount: f64,
    status: ConnectionStatus,
) -> bool {
    check_place_bet(game, player, pending, bet_amount, status).is_ok()
}

#[inline]
pub fn can_cash_out(
    game: Option<&GameState>,
    player: &PlayerState,
    pending: &PendingActions,
    status: ConnectionStatus,
) -> bool {
    check_cash_out(game, player, pending, status).is_ok()
}

/// Headline text for the current phase
pub fn status_text(game: Option<&GameState>) -> String {
    match game {
        None => "Loading...".to_string(),
        Some(state) => match state.phase {
            GamePhase::Waiting if state.time_left > 0 => {
                format!("Next round in {}s", state.time_left)
            }
            GamePhase::Waiting => "Waiting for round...".to_string(),
            GamePhase::Playing => "Game in progress!".to_string(),
            GamePhase::Crashed => "Crashed!".to_string(),
        },
    }
}

/// What the active bet would pay at the current multiplier
pub fn potential_win(game: Option<&GameState>, player: &PlayerState) -> Option<f64> {
    let bet = player.current_bet.as_ref()?;
    let multiplier = game.map_or(1.0, |g| g.multiplier);
    Some(bet.usd_amount * multiplier)
}

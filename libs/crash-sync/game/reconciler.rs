//! Server event reconciliation
//!
//! The reconciler is the only writer of [`GameState`] and [`PlayerState`].
//! Server messages drive every phase change; the client never advances the
//! round on its own.
//!
//! # Round state machine
//!
//! ```text
//!   ┌─────────┐  phase=playing  ┌─────────┐  phase=crashed  ┌─────────┐
//!   │ Waiting │────────────────▶│ Playing │────────────────▶│ Crashed │
//!   └─────────┘                 └─────────┘                 └────┬────┘
//!        ▲                                                       │
//!        └───────────────────── phase=waiting ───────────────────┘
//! ```
//!
//! Bet state is cleared by a single idempotent [`StateReconciler::reset_bet_state`]
//! from three independent triggers: a round rollover, entering `waiting`, and
//! the watchdog. Any one of them is enough to recover from a lost
//! resolution message.

use crate::core::connection_state::ConnectionStatus;
use crate::error::{ProtocolError, UserInputError};
use crate::game::eligibility;
use crate::game::notice::Notice;
use crate::game::protocol::{
    BetPlacedData, BetWonData, CashOutData, ConnectedData, CrashParser, GameStatePayload,
    InboundMessage, OutboundMessage, PlayerNameSetData, ServerErrorData,
};
use crate::game::state::{
    Cryptocurrency, GamePhase, GameState, PendingActions, PendingKind, PlayerState,
};
use crate::logging::Logger;
use crate::traits::{MessageParser, WsMessage};
use serde_json::json;

/// What triggered a bet-state reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    RoundRollover,
    EnteredWaiting,
    Watchdog,
}

impl ResetReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetReason::RoundRollover => "round_rollover",
            ResetReason::EnteredWaiting => "entered_waiting",
            ResetReason::Watchdog => "watchdog",
        }
    }
}

#[derive(Debug)]
pub struct StateReconciler {
    game: Option<GameState>,
    player: PlayerState,
    pending: PendingActions,
    name_prompt_open: bool,
    parser: CrashParser,
    logger: Logger,
    notices: Vec<Notice>,
}

impl StateReconciler {
    pub fn new(logger: Logger) -> Self {
        Self {
            game: None,
            player: PlayerState::default(),
            pending: PendingActions::default(),
            name_prompt_open: true,
            parser: CrashParser,
            logger,
            notices: Vec::new(),
        }
    }

    /// `None` until the first state message arrives
    pub fn game(&self) -> Option<&GameState> {
        self.game.as_ref()
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn pending(&self) -> &PendingActions {
        &self.pending
    }

    /// True until the server confirms a player name
    pub fn name_prompt_open(&self) -> bool {
        self.name_prompt_open
    }

    /// Name to replay after a (re)connect, if one was set locally
    pub fn player_name_for_replay(&self) -> Option<&str> {
        let name = self.player.player_name.as_str();
        (!name.is_empty()).then_some(name)
    }

    /// Take notices produced since the last call
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// A new transport is up; the next `connected` message assigns a fresh
    /// session id.
    pub fn on_transport_opened(&mut self) {
        self.player.session_id = None;
    }

    /// Parse and apply one frame. Malformed frames are logged and leave state
    /// untouched.
    pub fn handle_frame(&mut self, frame: &WsMessage) -> Result<(), ProtocolError> {
        let result = self
            .parser
            .parse(frame)
            .and_then(|message| self.apply(message));

        if let Err(e) = &result {
            self.logger.warn(
                "Dropping malformed server message",
                Some(json!({
                    "error": e.to_string(),
                    "frame": frame.as_text().unwrap_or("<binary>"),
                })),
            );
        }
        result
    }

    pub fn apply(&mut self, message: InboundMessage) -> Result<(), ProtocolError> {
        self.logger
            .debug("Received message", Some(json!({ "type": message.kind() })));

        match message {
            InboundMessage::Connected(data) => self.on_connected(data),
            InboundMessage::PlayerNameSet(data) => {
                self.on_player_name_set(data);
                Ok(())
            }
            InboundMessage::GameStateUpdate(payload) => self.apply_game_state(&payload),
            InboundMessage::BetPlaced(data) => {
                self.on_bet_placed(data);
                Ok(())
            }
            InboundMessage::BetWon(data) => {
                self.on_bet_won(data);
                Ok(())
            }
            InboundMessage::BetLost => {
                self.on_bet_lost();
                Ok(())
            }
            InboundMessage::CashOutSuccess(data) => {
                self.on_cash_out_success(data);
                Ok(())
            }
            InboundMessage::Error(data) => {
                self.on_server_error(data);
                Ok(())
            }
        }
    }

    fn on_connected(&mut self, data: ConnectedData) -> Result<(), ProtocolError> {
        // A bad embedded state rejects the whole message before anything changes
        let initial = data
            .game_state
            .as_ref()
            .map(GameStatePayload::normalize)
            .transpose()?;

        match self.player.session_id.clone() {
            Some(existing) if existing != data.session_id => {
                self.logger.warn(
                    "Ignoring session id change within one connection",
                    Some(json!({ "current": existing, "received": data.session_id })),
                );
            }
            Some(_) => {}
            None => self.player.session_id = Some(data.session_id.clone()),
        }
        self.player.balance = data.balance;

        let short_id: String = {
            let chars: Vec<char> = data.session_id.chars().collect();
            chars[chars.len().saturating_sub(6)..].iter().collect()
        };
        self.notices
            .push(Notice::success(format!("Session started: {}", short_id)));
        self.logger.info(
            "Session started",
            Some(json!({ "sessionId": data.session_id, "balance": data.balance })),
        );

        if let Some(next) = initial {
            self.apply_normalized_state(next);
        }
        Ok(())
    }

    fn on_player_name_set(&mut self, data: PlayerNameSetData) {
        self.player.player_name = data.player_name;
        self.player.balance = data.balance;
        self.name_prompt_open = false;
        self.notices.push(Notice::success(format!(
            "Name set: {}",
            self.player.player_name
        )));
    }

    fn on_bet_placed(&mut self, data: BetPlacedData) {
        self.notices.push(Notice::success(format!(
            "Bet placed: ${:.2} ({})",
            data.bet.usd_amount, data.bet.cryptocurrency
        )));
        self.player.balance = data.new_balance;
        self.player.current_bet = Some(data.bet);
        self.pending.clear(PendingKind::PlaceBet);
    }

    fn on_bet_won(&mut self, data: BetWonData) {
        self.player.balance = data.new_balance;
        self.player.clear_bet();
        self.pending.clear_all();
        let text = match data.win_amount {
            Some(win) => format!(
                "Bet won ${:.2}! New balance: ${:.2}",
                win, data.new_balance
            ),
            None => format!("Bet won! New balance: ${:.2}", data.new_balance),
        };
        self.notices.push(Notice::success(text));
    }

    fn on_bet_lost(&mut self) {
        self.player.clear_bet();
        self.pending.clear_all();
        self.notices.push(Notice::info("Bet lost"));
    }

    fn on_cash_out_success(&mut self, data: CashOutData) {
        self.player.balance = data.new_balance;
        self.player.clear_bet();
        self.pending.clear(PendingKind::CashOut);
        let text = match data.win_amount {
            Some(win) => format!("Cashed out! Win: ${:.2}", win),
            None => format!("Cashed out! New balance: ${:.2}", data.new_balance),
        };
        self.notices.push(Notice::success(text));
    }

    /// Server rejections clear both in-flight guards, whatever the error was
    /// about.
    fn on_server_error(&mut self, data: ServerErrorData) {
        self.pending.clear_all();
        self.logger
            .error("Game error", Some(json!({ "message": data.message })));
        self.notices
            .push(Notice::error(format!("Error: {}", data.message)));
    }

    /// Normalize, detect rollover and phase transitions, then replace the
    /// game state wholesale.
    pub fn apply_game_state(&mut self, payload: &GameStatePayload) -> Result<(), ProtocolError> {
        let next = payload.normalize()?;
        self.apply_normalized_state(next);
        Ok(())
    }

    fn apply_normalized_state(&mut self, next: GameState) {
        let previous = self.game.as_ref().map(|g| (g.phase, g.current_round));

        if let Some((_, previous_round)) = previous {
            if next.current_round > previous_round {
                self.reset_bet_state(ResetReason::RoundRollover);
            } else if next.current_round < previous_round {
                self.logger.warn(
                    "Round number went backwards",
                    Some(json!({ "previous": previous_round, "received": next.current_round })),
                );
            }
        }

        let phase_changed = previous.map_or(true, |(phase, _)| phase != next.phase);
        if phase_changed {
            match next.phase {
                GamePhase::Waiting => {
                    self.reset_bet_state(ResetReason::EnteredWaiting);
                    self.notices.push(Notice::info(format!(
                        "New round starting in {}s",
                        next.time_left
                    )));
                }
                GamePhase::Playing => {
                    self.notices.push(Notice::info(format!(
                        "Round {} started!",
                        next.current_round
                    )));
                }
                GamePhase::Crashed => {
                    // Win or loss still arrives as its own message
                    self.pending.clear_all();
                    self.notices.push(Notice::warning(format!(
                        "Crashed at {:.2}x",
                        next.multiplier
                    )));
                }
            }
        }

        self.game = Some(next);
    }

    // =========================================================================
    // Self-healing
    // =========================================================================

    /// Clear the bet and both in-flight guards. Safe to call any number of
    /// times; returns whether anything was cleared.
    pub fn reset_bet_state(&mut self, reason: ResetReason) -> bool {
        let had_bet = self.player.current_bet.clone();
        let cleared_bet = self.player.clear_bet();
        let cleared_pending = self.pending.clear_all();

        if cleared_bet || cleared_pending {
            let data = json!({
                "reason": reason.as_str(),
                "bet": had_bet,
                "clearedPending": cleared_pending,
            });
            match reason {
                ResetReason::Watchdog => self.logger.warn("Force-clearing stuck bet state", Some(data)),
                _ => self.logger.debug("Cleared bet state", Some(data)),
            }
        }
        cleared_bet || cleared_pending
    }

    /// Periodic check for a bet that can no longer be resolved: still active
    /// while waiting with the countdown already at zero.
    pub fn run_watchdog(&mut self) -> bool {
        let stuck = match &self.game {
            Some(game) => {
                self.player.has_active_bet()
                    && game.phase == GamePhase::Waiting
                    && game.time_left == 0
            }
            None => false,
        };

        if stuck && self.reset_bet_state(ResetReason::Watchdog) {
            self.notices
                .push(Notice::warning("Bet state was stuck and has been reset"));
            return true;
        }
        false
    }

    /// Safety timer expired for an intent; clear its guard if no response
    /// has done so already.
    pub fn expire_pending(&mut self, kind: PendingKind) -> bool {
        if !self.pending.clear(kind) {
            return false;
        }
        let text = match kind {
            PendingKind::PlaceBet => "Bet request timed out",
            PendingKind::CashOut => "Cash out request timed out",
        };
        self.logger.warn(text, None);
        self.notices.push(Notice::warning(text));
        true
    }

    // =========================================================================
    // Intents
    // =========================================================================

    /// Store a trimmed name locally; it is sent now or replayed on connect.
    pub fn set_player_name(&mut self, name: &str) -> Result<OutboundMessage, UserInputError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(UserInputError::EmptyName);
        }
        self.player.player_name = trimmed.to_string();
        Ok(OutboundMessage::SetPlayerName {
            player_name: trimmed.to_string(),
        })
    }

    /// Re-validate and mark a bet in flight
    pub fn place_bet(
        &mut self,
        usd_amount: f64,
        cryptocurrency: Cryptocurrency,
        status: ConnectionStatus,
    ) -> Result<OutboundMessage, UserInputError> {
        eligibility::check_place_bet(
            self.game.as_ref(),
            &self.player,
            &self.pending,
            usd_amount,
            status,
        )?;
        self.pending.set(PendingKind::PlaceBet);
        self.logger.info(
            "Placing bet",
            Some(json!({ "usdAmount": usd_amount, "cryptocurrency": cryptocurrency })),
        );
        Ok(OutboundMessage::PlaceBet {
            usd_amount,
            cryptocurrency,
        })
    }

    /// Re-validate and mark a cash out in flight
    pub fn cash_out(&mut self, status: ConnectionStatus) -> Result<OutboundMessage, UserInputError> {
        eligibility::check_cash_out(self.game.as_ref(), &self.player, &self.pending, status)?;
        self.pending.set(PendingKind::CashOut);
        self.logger.info(
            "Cashing out",
            Some(json!({ "multiplier": self.game.as_ref().map(|g| g.multiplier) })),
        );
        Ok(OutboundMessage::CashOut {})
    }

    // =========================================================================
    // Derived
    // =========================================================================

    pub fn can_place_bet(&self, bet_amount: f64, status: ConnectionStatus) -> bool {
        eligibility::can_place_bet(
            self.game.as_ref(),
            &self.player,
            &self.pending,
            bet_amount,
            status,
        )
    }

    pub fn can_cash_out(&self, status: ConnectionStatus) -> bool {
        eligibility::can_cash_out(self.game.as_ref(), &self.player, &self.pending, status)
    }

    pub fn status_text(&self) -> String {
        eligibility::status_text(self.game.as_ref())
    }

    pub fn potential_win(&self) -> Option<f64> {
        eligibility::potential_win(self.game.as_ref(), &self.player)
    }
}

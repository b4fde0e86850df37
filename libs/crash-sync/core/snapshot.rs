use crate::core::connection_state::ConnectionStatus;
use crate::game::eligibility;
use crate::game::{GameState, PendingActions, PlayerState};
use crate::network::NetworkInfo;
use serde::Serialize;

/// Read-only projection of the session for a front end
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    pub status: ConnectionStatus,
    pub network: NetworkInfo,
    /// Automatic reconnection has given up
    pub exhausted: bool,
    pub game: Option<GameState>,
    pub player: PlayerState,
    pub pending: PendingActions,
    pub show_name_prompt: bool,
    pub status_text: String,
    pub potential_win: Option<f64>,
}

impl ClientSnapshot {
    pub fn can_place_bet(&self, bet_amount: f64) -> bool {
        eligibility::can_place_bet(
            self.game.as_ref(),
            &self.player,
            &self.pending,
            bet_amount,
            self.status,
        )
    }

    pub fn can_cash_out(&self) -> bool {
        eligibility::can_cash_out(self.game.as_ref(), &self.player, &self.pending, self.status)
    }

    #[inline]
    pub fn has_active_bet(&self) -> bool {
        self.player.has_active_bet()
    }
}

//! Game and player state mirrored from the server

use crate::error::ProtocolError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Round phase. Cycles waiting → playing → crashed → waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    #[default]
    Waiting,
    Playing,
    Crashed,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Waiting => "waiting",
            GamePhase::Playing => "playing",
            GamePhase::Crashed => "crashed",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GamePhase {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(GamePhase::Waiting),
            "playing" => Ok(GamePhase::Playing),
            "crashed" => Ok(GamePhase::Crashed),
            other => Err(ProtocolError::UnknownPhase(other.to_string())),
        }
    }
}

/// Server-authoritative round state.
///
/// `multiplier` is always `1.0` while waiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub phase: GamePhase,
    pub multiplier: f64,
    /// Seconds until the next round starts
    pub time_left: u64,
    pub current_round: u64,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            phase: GamePhase::Waiting,
            multiplier: 1.0,
            time_left: 0,
            current_round: 0,
        }
    }
}

/// Cryptocurrency a bet is denominated in.
///
/// Identifiers outside the known set are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cryptocurrency {
    Bitcoin,
    Ethereum,
    BinanceCoin,
    Cardano,
    Other(String),
}

impl Cryptocurrency {
    /// The recognized coins, in display order
    pub fn all() -> [Cryptocurrency; 4] {
        [
            Cryptocurrency::Bitcoin,
            Cryptocurrency::Ethereum,
            Cryptocurrency::BinanceCoin,
            Cryptocurrency::Cardano,
        ]
    }

    /// Wire identifier (e.g., "bitcoin")
    pub fn id(&self) -> &str {
        match self {
            Cryptocurrency::Bitcoin => "bitcoin",
            Cryptocurrency::Ethereum => "ethereum",
            Cryptocurrency::BinanceCoin => "binancecoin",
            Cryptocurrency::Cardano => "cardano",
            Cryptocurrency::Other(id) => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Cryptocurrency::Bitcoin => "Bitcoin",
            Cryptocurrency::Ethereum => "Ethereum",
            Cryptocurrency::BinanceCoin => "BNB",
            Cryptocurrency::Cardano => "Cardano",
            Cryptocurrency::Other(id) => id,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Cryptocurrency::Bitcoin => "BTC",
            Cryptocurrency::Ethereum => "ETH",
            Cryptocurrency::BinanceCoin => "BNB",
            Cryptocurrency::Cardano => "ADA",
            Cryptocurrency::Other(id) => id,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Cryptocurrency::Other(_))
    }
}

impl Default for Cryptocurrency {
    fn default() -> Self {
        Cryptocurrency::Bitcoin
    }
}

impl From<String> for Cryptocurrency {
    fn from(id: String) -> Self {
        match id.as_str() {
            "bitcoin" => Cryptocurrency::Bitcoin,
            "ethereum" => Cryptocurrency::Ethereum,
            "binancecoin" => Cryptocurrency::BinanceCoin,
            "cardano" => Cryptocurrency::Cardano,
            _ => Cryptocurrency::Other(id),
        }
    }
}

impl From<&str> for Cryptocurrency {
    fn from(id: &str) -> Self {
        Cryptocurrency::from(id.to_string())
    }
}

impl From<Cryptocurrency> for String {
    fn from(crypto: Cryptocurrency) -> Self {
        match crypto {
            Cryptocurrency::Other(id) => id,
            known => known.id().to_string(),
        }
    }
}

impl fmt::Display for Cryptocurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A bet the server has accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub usd_amount: f64,
    pub cryptocurrency: Cryptocurrency,
}

/// Locally owned, server-confirmed player state.
///
/// There is no separate active-bet flag to drift out of sync: a bet is active
/// exactly when `current_bet` is present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerState {
    /// Assigned by the server once per connection
    pub session_id: Option<String>,
    /// Empty until set
    pub player_name: String,
    pub balance: f64,
    pub current_bet: Option<Bet>,
}

impl PlayerState {
    #[inline]
    pub fn has_active_bet(&self) -> bool {
        self.current_bet.is_some()
    }

    /// Drop the current bet; returns whether one was present
    pub fn clear_bet(&mut self) -> bool {
        self.current_bet.take().is_some()
    }
}

impl Serialize for PlayerState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PlayerState", 5)?;
        state.serialize_field("sessionId", &self.session_id)?;
        state.serialize_field("playerName", &self.player_name)?;
        state.serialize_field("balance", &self.balance)?;
        state.serialize_field("currentBet", &self.current_bet)?;
        state.serialize_field("hasActiveBet", &self.has_active_bet())?;
        state.end()
    }
}

/// In-flight intent guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingActions {
    pub is_placing_bet: bool,
    pub is_cashing_out: bool,
}

/// Which in-flight intent a guard belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKind {
    PlaceBet,
    CashOut,
}

impl PendingActions {
    pub fn is_set(&self, kind: PendingKind) -> bool {
        match kind {
            PendingKind::PlaceBet => self.is_placing_bet,
            PendingKind::CashOut => self.is_cashing_out,
        }
    }

    pub fn set(&mut self, kind: PendingKind) {
        match kind {
            PendingKind::PlaceBet => self.is_placing_bet = true,
            PendingKind::CashOut => self.is_cashing_out = true,
        }
    }

    /// Clear one guard; clearing an already-clear guard is a no-op
    pub fn clear(&mut self, kind: PendingKind) -> bool {
        let was_set = self.is_set(kind);
        match kind {
            PendingKind::PlaceBet => self.is_placing_bet = false,
            PendingKind::CashOut => self.is_cashing_out = false,
        }
        was_set
    }

    pub fn clear_all(&mut self) -> bool {
        let placing = self.clear(PendingKind::PlaceBet);
        let cashing = self.clear(PendingKind::CashOut);
        placing || cashing
    }

    pub fn any(&self) -> bool {
        self.is_placing_bet || self.is_cashing_out
    }
}

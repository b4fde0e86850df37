//! Wire format for the crash game server
//!
//! Every frame is a JSON object `{ "type": ..., "data": ... }`. Inbound frames
//! are decoded in two steps: the envelope first, then the `data` payload for
//! the specific type, so a bad payload reports which message it belonged to.

use crate::error::ProtocolError;
use crate::game::state::{Bet, Cryptocurrency, GamePhase, GameState};
use crate::traits::{MessageParser, WsMessage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Connected(ConnectedData),
    PlayerNameSet(PlayerNameSetData),
    GameStateUpdate(GameStatePayload),
    BetPlaced(BetPlacedData),
    BetWon(BetWonData),
    BetLost,
    CashOutSuccess(CashOutData),
    Error(ServerErrorData),
}

impl InboundMessage {
    /// Wire name of the message type
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Connected(_) => "connected",
            InboundMessage::PlayerNameSet(_) => "player_name_set",
            InboundMessage::GameStateUpdate(_) => "game_state_update",
            InboundMessage::BetPlaced(_) => "bet_placed",
            InboundMessage::BetWon(_) => "bet_won",
            InboundMessage::BetLost => "bet_lost",
            InboundMessage::CashOutSuccess(_) => "cash_out_success",
            InboundMessage::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedData {
    pub session_id: String,
    pub balance: f64,
    #[serde(default)]
    pub game_state: Option<GameStatePayload>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerNameSetData {
    pub player_name: String,
    pub balance: f64,
}

/// Raw game state as the server sends it.
///
/// The server has used both `phase`/`status` and `currentRound`/`roundNumber`,
/// and omits fields freely, so everything is optional until normalized.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameStatePayload {
    pub phase: Option<String>,
    pub status: Option<String>,
    pub multiplier: Option<f64>,
    pub time_left: Option<f64>,
    pub current_round: Option<f64>,
    pub round_number: Option<f64>,
}

impl GameStatePayload {
    /// Canonical state: missing phase is waiting, missing multiplier is 1.0,
    /// missing time and round are 0.
    pub fn normalize(&self) -> Result<GameState, ProtocolError> {
        let phase = match self.phase.as_deref().or(self.status.as_deref()) {
            Some(raw) => raw.parse::<GamePhase>()?,
            None => GamePhase::Waiting,
        };

        let multiplier = match phase {
            GamePhase::Waiting => 1.0,
            _ => self
                .multiplier
                .filter(|m| m.is_finite())
                .map_or(1.0, |m| m.max(1.0)),
        };

        let time_left = self
            .time_left
            .filter(|t| t.is_finite())
            .map_or(0, |t| t.max(0.0).ceil() as u64);

        let current_round = self
            .current_round
            .or(self.round_number)
            .filter(|r| r.is_finite())
            .map_or(0, |r| r.max(0.0).floor() as u64);

        Ok(GameState {
            phase,
            multiplier,
            time_left,
            current_round,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetPlacedData {
    pub new_balance: f64,
    pub bet: Bet,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetWonData {
    pub new_balance: f64,
    #[serde(default)]
    pub win_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashOutData {
    pub new_balance: f64,
    #[serde(default)]
    pub win_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerErrorData {
    pub message: String,
}

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    SetPlayerName {
        #[serde(rename = "playerName")]
        player_name: String,
    },
    PlaceBet {
        #[serde(rename = "usdAmount")]
        usd_amount: f64,
        cryptocurrency: Cryptocurrency,
    },
    CashOut {},
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::SetPlayerName { .. } => "set_player_name",
            OutboundMessage::PlaceBet { .. } => "place_bet",
            OutboundMessage::CashOut {} => "cash_out",
        }
    }

    /// Encode as a text frame
    pub fn to_ws_message(&self) -> Result<WsMessage, serde_json::Error> {
        serde_json::to_string(self).map(WsMessage::Text)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
    /// Some server builds put the error text beside `data`
    #[serde(default)]
    message: Option<String>,
}

fn decode<T: DeserializeOwned>(kind: &str, data: Option<Value>) -> Result<T, ProtocolError> {
    let data = data.ok_or_else(|| ProtocolError::MissingData {
        kind: kind.to_string(),
    })?;
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

fn ensure_balance(kind: &str, balance: f64) -> Result<(), ProtocolError> {
    if balance.is_finite() && balance >= 0.0 {
        Ok(())
    } else {
        Err(ProtocolError::InvalidPayload {
            kind: kind.to_string(),
            reason: format!("balance must be a non-negative number, got {}", balance),
        })
    }
}

/// Decode one inbound text frame
pub fn parse_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let kind = envelope.kind.as_str();

    let message = match kind {
        "connected" => {
            let data: ConnectedData = decode(kind, envelope.data)?;
            ensure_balance(kind, data.balance)?;
            InboundMessage::Connected(data)
        }
        "player_name_set" => {
            let data: PlayerNameSetData = decode(kind, envelope.data)?;
            ensure_balance(kind, data.balance)?;
            InboundMessage::PlayerNameSet(data)
        }
        "game_state_update" => InboundMessage::GameStateUpdate(decode(kind, envelope.data)?),
        "bet_placed" => {
            let data: BetPlacedData = decode(kind, envelope.data)?;
            ensure_balance(kind, data.new_balance)?;
            if !(data.bet.usd_amount.is_finite() && data.bet.usd_amount > 0.0) {
                return Err(ProtocolError::InvalidPayload {
                    kind: kind.to_string(),
                    reason: format!("bet amount must be positive, got {}", data.bet.usd_amount),
                });
            }
            InboundMessage::BetPlaced(data)
        }
        "bet_won" => {
            let data: BetWonData = decode(kind, envelope.data)?;
            ensure_balance(kind, data.new_balance)?;
            InboundMessage::BetWon(data)
        }
        "bet_lost" => InboundMessage::BetLost,
        "cash_out_success" => {
            let data: CashOutData = decode(kind, envelope.data)?;
            ensure_balance(kind, data.new_balance)?;
            InboundMessage::CashOutSuccess(data)
        }
        "error" => {
            let from_data = envelope
                .data
                .as_ref()
                .and_then(|d| d.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let message = from_data
                .or(envelope.message)
                .unwrap_or_else(|| "Unknown server error".to_string());
            InboundMessage::Error(ServerErrorData { message })
        }
        other => return Err(ProtocolError::UnknownType(other.to_string())),
    };

    Ok(message)
}

/// Parser for the crash game protocol
#[derive(Debug, Clone, Copy, Default)]
pub struct CrashParser;

impl MessageParser for CrashParser {
    type Message = InboundMessage;

    fn parse(&self, message: &WsMessage) -> Result<Self::Message, ProtocolError> {
        match message.as_text() {
            Some(text) => parse_inbound(text),
            None => Err(ProtocolError::BinaryFrame),
        }
    }
}

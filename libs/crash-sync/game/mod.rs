//! Game domain: wire protocol, mirrored state and its reconciliation

pub mod eligibility;
pub mod notice;
pub mod protocol;
pub mod reconciler;
pub mod state;

pub use notice::{Notice, NoticeKind};
pub use protocol::{parse_inbound, CrashParser, GameStatePayload, InboundMessage, OutboundMessage};
pub use reconciler::{ResetReason, StateReconciler};
pub use state::{
    Bet, Cryptocurrency, GamePhase, GameState, PendingActions, PendingKind, PlayerState,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag identifying what kind of domain event occurred (spec §4.8 "Required
/// pairings"). The `Display` strings are the exact `tipo` values the
/// original system persists and must not change shape — other crates and
/// tests match on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Apertura,
    AperturaHijaParcial,
    CierreTotal,
    CierreParcial,
    Dca,
    RejectionOpen,
    RejectionDca,
    PnlNoRealizado,
    FinalizacionInversionista,
    ErrorPersistencia,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Apertura => "apertura",
            EventKind::AperturaHijaParcial => "apertura_hija_parcial",
            EventKind::CierreTotal => "cierre_total",
            EventKind::CierreParcial => "cierre_parcial",
            EventKind::Dca => "dca",
            EventKind::RejectionOpen => "rejection_open",
            EventKind::RejectionDca => "rejection_dca",
            EventKind::PnlNoRealizado => "pnl_no_realizado",
            EventKind::FinalizacionInversionista => "finalizacion_inversionista",
            EventKind::ErrorPersistencia => "error_persistencia",
        }
    }
}

/// One audit-log entry: a tagged record emitted to the logger (spec §3
/// "Event"). `detail` carries kind-specific, JSON-serialized context (op id,
/// motive, prices, capital before/after, ...).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub ts: i64,
    pub investor_fk: i64,
    pub op_id: Option<i64>,
    pub detail: Value,
}

impl Event {
    pub fn new(kind: EventKind, ts: i64, investor_fk: i64, op_id: Option<i64>, detail: Value) -> Self {
        Self {
            kind,
            ts,
            investor_fk,
            op_id,
            detail,
        }
    }
}

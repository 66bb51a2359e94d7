// src/models/mod.rs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Schema version of the persisted operational document. A loaded document
/// whose `meta.version` differs is discarded and reseeded — there is no
/// in-place migration.
pub const SCHEMA_VERSION: u32 = 1;

// ───────────────────────────────────────
// Root document
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Db {
    pub meta: DbMeta,
    pub users: Vec<User>,
    pub campaigns: Vec<Campaign>,
    pub agents: Vec<Agent>,
    pub resources: Vec<Resource>,
    pub assignments: Vec<Assignment>,
    pub kpi_records: Vec<KpiRecord>,
    pub interactions: Vec<Interaction>,
    pub quality_evaluations: Vec<QualityEvaluation>,
    pub incidents: Vec<Incident>,
    pub integrations: Vec<Integration>,
    pub pipelines: Vec<Pipeline>,
    pub kpi_catalog: Vec<KpiDef>,
    pub notifications: Vec<Notification>,
    pub audit_logs: Vec<AuditLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMeta {
    pub version: u32,
    pub seeded_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Users & session (simple RBAC role string)
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,              // unique, compared case-insensitively
    pub role: String,               // Admin|Supervisor|Analista|Operador
    pub password_hash: String,      // SHA-256 hex
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub login_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Campaigns & agents
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub client: String,
    pub country: String,
    pub channels: Vec<String>,
    pub status: String,             // Planificada|Activa|Pausada|Cerrada
    pub start_date: NaiveDate,
    pub owner: String,
    pub targets: CampaignTargets,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operational targets. A zero `conversion`/`recovery` means the metric does
/// not apply to the campaign and is neither simulated nor alerted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTargets {
    pub sla: f64,                   // fraction 0..1
    pub csat: f64,                  // points 0..100
    pub aht: f64,                   // seconds
    pub conversion: f64,            // fraction 0..1
    pub recovery: f64,              // fraction 0..1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub team: String,
    pub campaign_id: String,
    pub status: String,             // Activo|En descanso
    pub hired_at: NaiveDate,
}

// ───────────────────────────────────────
// Resources & assignments
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,               // PC|Headset|Teléfono|Monitor|Teclado
    pub code: String,               // intended-unique inventory code
    pub model: String,
    pub status: String,             // Disponible|Asignado|Mantenimiento|Retirado
    pub location: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// At most one assignment per resource has `active = true` at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub resource_id: String,
    pub agent_id: String,
    pub campaign_id: String,
    pub at: DateTime<Utc>,
    pub active: bool,
}

// ───────────────────────────────────────
// KPI time series & omnichannel log
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiRecord {
    pub id: String,
    pub campaign_id: String,
    pub at: DateTime<Utc>,
    pub contacts: i32,
    pub answered: i32,
    pub abandoned: i32,
    pub sla: f64,                   // 0..1
    pub aht: i32,                   // seconds
    pub csat: i32,                  // points
    pub nps: i32,
    pub conversion: f64,            // 0..1
    pub recovery: f64,              // 0..1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub campaign_id: String,
    pub channel: String,            // Voz|Chat|WhatsApp|Email
    pub customer: String,
    pub status: String,             // Resuelto|En curso|En cola
    pub priority: String,           // Alta|Media|Baja
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityEvaluation {
    pub id: String,
    pub campaign_id: String,
    pub agent_id: String,
    pub at: DateTime<Utc>,
    pub score: i32,                 // 0..100
    pub checklist: BTreeMap<String, bool>,
    pub notes: String,
}

// ───────────────────────────────────────
// Incidents
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub category: String,
    pub priority: String,           // Alta|Media|Baja
    pub status: String,             // Abierto|En curso|Resuelto
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_to: String,
    pub related_campaign_id: String, // empty when unrelated
}

// ───────────────────────────────────────
// Data hub: connectors, ETL jobs, KPI catalog
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub id: String,
    pub name: String,
    pub status: String,             // Conectado|Degradado|Desconectado
    pub last_sync_at: DateTime<Utc>,
    pub next_sync_at: DateTime<Utc>,
    pub health: f64,                // 0..100, clamped to a status band
    pub endpoint: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub source: String,
    pub dest: String,
    pub schedule: String,
    pub last_run_at: DateTime<Utc>,
    pub status: String,             // OK|Retrasado|Error
    pub rows: i32,
    pub duration_sec: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiDef {
    pub id: String,
    pub code: String,               // intended-unique, upper-cased
    pub name: String,
    pub frequency: String,
    pub owner: String,
    pub formula: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Notifications & audit trail
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub at: DateTime<Utc>,
    pub read: bool,
    #[serde(rename = "type")]
    pub kind: String,               // info|success|warn|danger
    pub title: String,
    pub message: String,
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub at: DateTime<Utc>,
    pub actor: String,              // session email or "sistema"
    pub severity: String,           // info|warn|danger
    #[serde(rename = "type")]
    pub kind: String,               // e.g. auth.login, resource.assign, notify.auto
    pub message: String,
    pub meta: serde_json::Value,
}

// ───────────────────────────────────────
// Settings
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: String,              // dark|light
    pub realtime: bool,
    pub compact_sidebar: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { theme: "dark".into(), realtime: true, compact_sidebar: false }
    }
}

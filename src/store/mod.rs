// src/store/mod.rs
//
// Central state: the operational document (DB), the user session and the
// settings, each persisted as an independent blob through the storage
// bridge. All DB mutation funnels through `transact`, which persists the
// whole document and then notifies subscribers. Authentication here is for
// demonstration only (seeded credentials, no real security guarantees).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::events::{EventBus, StoreEvent, Subscription, Topic};
use crate::models::{
    Assignment, AuditLog, Campaign, CampaignTargets, Db, Incident, KpiDef, Notification,
    Resource, Session, Settings, User, SCHEMA_VERSION,
};
use crate::storage::Storage;

pub mod seed;

pub const DB_KEY: &str = "sigcr_demo_db_v1";
pub const SESSION_KEY: &str = "sigcr_demo_session_v1";
pub const SETTINGS_KEY: &str = "sigcr_demo_settings_v1";

const AUDIT_CAP: usize = 400;
const NOTIFICATION_CAP: usize = 80;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Usuario no encontrado.")]
    UserNotFound,
    #[error("Contraseña incorrecta.")]
    InvalidCredential,
    #[error("{0}")]
    Validation(String),
    #[error("almacenamiento: {0}")]
    Storage(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Utilities
// ─────────────────────────────────────────────────────────────────────────────

pub fn uid(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4())
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn load_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Option<T> {
    // read/parse failures degrade to "absent"; callers reseed or default
    let raw = storage.get(key).ok().flatten()?;
    serde_json::from_str(&raw).ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Mutation payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Audit side effect attached to a transaction. `actor` defaults to the
/// current session's email, or `"sistema"` without a session.
#[derive(Debug, Clone)]
pub struct AuditInput {
    pub kind: String,
    pub severity: String,
    pub message: String,
    pub actor: Option<String>,
    pub meta: serde_json::Value,
}

impl AuditInput {
    pub fn info(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            severity: "info".into(),
            message: message.into(),
            actor: None,
            meta: json!({}),
        }
    }

    pub fn warn(kind: &str, message: impl Into<String>) -> Self {
        Self { severity: "warn".into(), ..Self::info(kind, message) }
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub client: String,
    pub country: String,
    pub channels: Vec<String>,
    pub status: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub owner: Option<String>,
    pub targets: Option<CampaignTargets>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CampaignPatch {
    pub name: Option<String>,
    pub client: Option<String>,
    pub country: Option<String>,
    pub channels: Option<Vec<String>>,
    pub status: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub owner: Option<String>,
    pub targets: Option<CampaignTargets>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub kind: String,
    pub code: String,
    pub model: String,
    pub status: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourcePatch {
    pub kind: Option<String>,
    pub code: Option<String>,
    pub model: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssignResource {
    pub resource_id: String,
    pub agent_id: String,
    pub campaign_id: String,
}

#[derive(Debug, Clone)]
pub struct NewIncident {
    pub title: String,
    pub category: String,
    pub priority: String,
    pub status: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub related_campaign_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IncidentPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub related_campaign_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewKpiDef {
    pub code: String,
    pub name: String,
    pub frequency: Option<String>,
    pub owner: Option<String>,
    pub formula: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub theme: Option<String>,
    pub realtime: Option<bool>,
    pub compact_sidebar: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NotificationInput {
    pub kind: String,
    pub title: String,
    pub message: String,
    pub meta: serde_json::Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

pub struct Store {
    storage: Arc<dyn Storage>,
    db: Mutex<Db>,
    settings: Mutex<Settings>,
    bus: Arc<EventBus>,
}

impl Store {
    /// Load-or-seed. A missing, unparsable or version-mismatched DB blob is
    /// replaced by a fresh seed document and persisted immediately.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Arc<Self>> {
        let settings: Settings =
            load_json(&*storage, SETTINGS_KEY).unwrap_or_default();

        let loaded: Option<Db> = load_json(&*storage, DB_KEY);
        let (db, fresh) = match loaded {
            Some(db) if db.meta.version == SCHEMA_VERSION => (db, false),
            other => {
                if other.is_some() {
                    tracing::info!("discarding persisted DB with stale schema, reseeding");
                } else {
                    tracing::info!("no persisted DB, seeding demo document");
                }
                (seed::seed_db(Utc::now()), true)
            }
        };

        let store = Arc::new(Self {
            storage,
            db: Mutex::new(db),
            settings: Mutex::new(settings),
            bus: EventBus::new(),
        });
        if fresh {
            store.persist_db(&store.db.lock())?;
        }
        Ok(store)
    }

    /// Live operational document, behind its lock. Do not hold the guard
    /// across a call to `transact` or any mutator — that deadlocks.
    pub fn db(&self) -> MutexGuard<'_, Db> {
        self.db.lock()
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().clone()
    }

    /// Re-read from storage on every call; never cached in memory.
    pub fn session(&self) -> Option<Session> {
        load_json(&*self.storage, SESSION_KEY)
    }

    pub fn on(
        &self,
        topic: Topic,
        handler: impl Fn(&StoreEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(topic, handler)
    }

    // ── transactions ─────────────────────────────────────────────────────

    /// The sole sanctioned way to change the DB: run the mutator against the
    /// locked document, optionally append an audit entry, persist the whole
    /// document, then emit `db:changed`. Subscribers always observe the
    /// fully-applied mutation. There is no rollback: a persist failure
    /// propagates and leaves the in-memory edits in place, so mutators are
    /// treated as must-not-fail.
    pub fn transact<R>(
        &self,
        mutator: impl FnOnce(&mut Db) -> R,
        audit: Option<AuditInput>,
    ) -> Result<R> {
        let session = self.session();
        let out = {
            let mut db = self.db.lock();
            let out = mutator(&mut db);
            if let Some(entry) = audit {
                push_audit(&mut db, entry, session.as_ref());
            }
            self.persist_db(&db)?;
            out
        };
        self.bus.emit(&StoreEvent::DbChanged);
        Ok(out)
    }

    /// Append an audit entry outside a transaction (persists and notifies).
    pub fn add_audit(&self, entry: AuditInput) -> Result<()> {
        self.transact(|_| (), Some(entry))
    }

    /// Prepend a notification (rolling cap 80). Not audited.
    pub fn add_notification(&self, input: NotificationInput) -> Result<Notification> {
        let n = Notification {
            id: uid("ntf"),
            at: Utc::now(),
            read: false,
            kind: input.kind,
            title: input.title,
            message: input.message,
            meta: input.meta,
        };
        let out = n.clone();
        self.transact(
            move |d| {
                d.notifications.insert(0, n);
                d.notifications.truncate(NOTIFICATION_CAP);
            },
            None,
        )?;
        Ok(out)
    }

    pub fn mark_notifications_read(&self) -> Result<()> {
        self.transact(
            |d| d.notifications.iter_mut().for_each(|n| n.read = true),
            Some(AuditInput::info(
                "notify.readAll",
                "Notificaciones marcadas como leídas",
            )),
        )
    }

    // ── session ──────────────────────────────────────────────────────────

    pub fn login(&self, email: &str, password: &str) -> Result<Session> {
        let session = {
            let db = self.db.lock();
            let user = db
                .users
                .iter()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .ok_or(StoreError::UserNotFound)?;
            if user.password_hash != sha256_hex(password) {
                return Err(StoreError::InvalidCredential);
            }
            Session {
                user_id: user.id.clone(),
                name: user.name.clone(),
                email: user.email.clone(),
                role: user.role.clone(),
                login_at: Utc::now(),
            }
        };

        self.set_session(Some(&session))?;

        // the audit write bypasses `transact`, so it persists and notifies
        // on its own
        {
            let mut db = self.db.lock();
            push_audit(
                &mut db,
                AuditInput::info("auth.login", format!("Inicio de sesión: {}", session.email))
                    .actor(session.email.clone()),
                Some(&session),
            );
            self.persist_db(&db)?;
        }
        self.bus.emit(&StoreEvent::DbChanged);

        tracing::debug!(email = %session.email, role = %session.role, "login ok");
        Ok(session)
    }

    pub fn logout(&self) -> Result<()> {
        let prev = self.session();
        self.set_session(None)?;
        if let Some(s) = prev {
            {
                let mut db = self.db.lock();
                push_audit(
                    &mut db,
                    AuditInput::info("auth.logout", format!("Cierre de sesión: {}", s.email))
                        .actor(s.email.clone()),
                    Some(&s),
                );
                self.persist_db(&db)?;
            }
            self.bus.emit(&StoreEvent::DbChanged);
        }
        Ok(())
    }

    /// Write or clear the session blob and emit `session:changed`.
    pub fn set_session(&self, session: Option<&Session>) -> Result<()> {
        match session {
            Some(s) => {
                let raw =
                    serde_json::to_string(s).map_err(|e| StoreError::Storage(e.into()))?;
                self.storage.set(SESSION_KEY, &raw).map_err(StoreError::Storage)?;
            }
            None => self.storage.remove(SESSION_KEY).map_err(StoreError::Storage)?,
        }
        self.bus.emit(&StoreEvent::SessionChanged(session.cloned()));
        Ok(())
    }

    pub fn current_user(&self) -> Option<User> {
        let s = self.session()?;
        self.db.lock().users.iter().find(|u| u.id == s.user_id).cloned()
    }

    /// `None` means no restriction. Returns false without a session.
    pub fn require_role(&self, roles: Option<&[&str]>) -> bool {
        let Some(s) = self.session() else { return false };
        match roles {
            None => true,
            Some(list) => list.contains(&s.role.as_str()),
        }
    }

    // ── settings ─────────────────────────────────────────────────────────

    pub fn update_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        let next = {
            let mut s = self.settings.lock();
            if let Some(theme) = patch.theme {
                s.theme = theme;
            }
            if let Some(realtime) = patch.realtime {
                s.realtime = realtime;
            }
            if let Some(compact) = patch.compact_sidebar {
                s.compact_sidebar = compact;
            }
            s.clone()
        };
        self.persist_settings(&next)?;
        self.bus.emit(&StoreEvent::SettingsChanged(next.clone()));
        Ok(next)
    }

    // ── resets ───────────────────────────────────────────────────────────

    /// Erase all three blobs, reseed the DB, restore default settings and
    /// clear the session. Emits `db:changed`, `session:changed(None)`,
    /// `settings:changed` in that order.
    pub fn reset_all(&self) -> Result<()> {
        self.storage.remove(DB_KEY).map_err(StoreError::Storage)?;
        self.storage.remove(SESSION_KEY).map_err(StoreError::Storage)?;
        self.storage.remove(SETTINGS_KEY).map_err(StoreError::Storage)?;

        let defaults = Settings::default();
        {
            let mut db = self.db.lock();
            *db = seed::seed_db(Utc::now());
            self.persist_db(&db)?;
        }
        *self.settings.lock() = defaults.clone();

        self.bus.emit(&StoreEvent::DbChanged);
        self.bus.emit(&StoreEvent::SessionChanged(None));
        self.bus.emit(&StoreEvent::SettingsChanged(defaults));
        tracing::info!("demo data reset");
        Ok(())
    }

    pub fn reset_demo(&self) -> Result<()> {
        self.reset_all()
    }

    pub fn clear_local_data(&self) -> Result<()> {
        self.reset_all()
    }

    // ── campaigns ────────────────────────────────────────────────────────

    pub fn create_campaign(&self, payload: NewCampaign) -> Result<Campaign> {
        let name = payload.name.trim().to_string();
        let client = payload.client.trim().to_string();
        if name.is_empty() || client.is_empty() {
            return Err(StoreError::Validation("Completa nombre y cliente.".into()));
        }

        let c = Campaign {
            id: uid("camp"),
            name,
            client,
            country: payload.country,
            channels: payload.channels,
            status: payload.status.unwrap_or_else(|| "Planificada".into()),
            start_date: payload.start_date.unwrap_or_else(|| Utc::now().date_naive()),
            owner: payload.owner.unwrap_or_else(|| "Operaciones".into()),
            targets: payload.targets.unwrap_or(CampaignTargets {
                sla: 0.80,
                csat: 85.0,
                aht: 320.0,
                conversion: 0.12,
                recovery: 0.18,
            }),
            notes: payload.notes.unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let out = c.clone();
        self.transact(
            move |d| d.campaigns.insert(0, c),
            Some(
                AuditInput::info("campaign.create", format!("Campaña creada: {}", out.name))
                    .meta(json!({ "campaignId": out.id })),
            ),
        )?;
        Ok(out)
    }

    pub fn update_campaign(&self, id: &str, patch: CampaignPatch) -> Result<()> {
        self.transact(
            |d| {
                let Some(c) = d.campaigns.iter_mut().find(|x| x.id == id) else { return };
                if let Some(v) = patch.name {
                    c.name = v;
                }
                if let Some(v) = patch.client {
                    c.client = v;
                }
                if let Some(v) = patch.country {
                    c.country = v;
                }
                if let Some(v) = patch.channels {
                    c.channels = v;
                }
                if let Some(v) = patch.status {
                    c.status = v;
                }
                if let Some(v) = patch.start_date {
                    c.start_date = v;
                }
                if let Some(v) = patch.owner {
                    c.owner = v;
                }
                if let Some(v) = patch.targets {
                    c.targets = v;
                }
                if let Some(v) = patch.notes {
                    c.notes = v;
                }
                c.updated_at = Utc::now();
            },
            Some(
                AuditInput::info("campaign.update", "Campaña actualizada")
                    .meta(json!({ "campaignId": id })),
            ),
        )
    }

    // ── resources & assignments ──────────────────────────────────────────

    pub fn create_resource(&self, payload: NewResource) -> Result<Resource> {
        let code = payload.code.trim().to_string();
        let model = payload.model.trim().to_string();
        if code.is_empty() || model.is_empty() {
            return Err(StoreError::Validation("Completa código y modelo.".into()));
        }

        let r = Resource {
            id: uid("res"),
            kind: payload.kind,
            code,
            model,
            status: payload.status.unwrap_or_else(|| "Disponible".into()),
            location: payload.location.unwrap_or_else(|| "Lima".into()),
            notes: payload.notes.unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let out = r.clone();
        self.transact(
            move |d| d.resources.insert(0, r),
            Some(
                AuditInput::info("resource.create", format!("Recurso agregado: {}", out.code))
                    .meta(json!({ "resourceId": out.id })),
            ),
        )?;
        Ok(out)
    }

    pub fn update_resource(&self, id: &str, patch: ResourcePatch) -> Result<()> {
        self.transact(
            |d| {
                let Some(r) = d.resources.iter_mut().find(|x| x.id == id) else { return };
                if let Some(v) = patch.kind {
                    r.kind = v;
                }
                if let Some(v) = patch.code {
                    r.code = v;
                }
                if let Some(v) = patch.model {
                    r.model = v;
                }
                if let Some(v) = patch.status {
                    r.status = v;
                }
                if let Some(v) = patch.location {
                    r.location = v;
                }
                if let Some(v) = patch.notes {
                    r.notes = v;
                }
                r.updated_at = Utc::now();
            },
            Some(
                AuditInput::info("resource.update", "Recurso actualizado")
                    .meta(json!({ "resourceId": id })),
            ),
        )
    }

    /// Marks the resource assigned and creates the active assignment; any
    /// prior active assignment for the same resource is deactivated within
    /// the same transaction, so exclusivity holds at every commit point.
    pub fn assign_resource(&self, input: AssignResource) -> Result<()> {
        let meta = json!({
            "resourceId": input.resource_id,
            "agentId": input.agent_id,
            "campaignId": input.campaign_id,
        });
        self.transact(
            move |d| {
                let Some(r) = d.resources.iter_mut().find(|x| x.id == input.resource_id)
                else {
                    return;
                };
                r.status = "Asignado".into();
                r.updated_at = Utc::now();

                for a in d
                    .assignments
                    .iter_mut()
                    .filter(|a| a.resource_id == input.resource_id && a.active)
                {
                    a.active = false;
                }
                d.assignments.insert(
                    0,
                    Assignment {
                        id: uid("asg"),
                        resource_id: input.resource_id,
                        agent_id: input.agent_id,
                        campaign_id: input.campaign_id,
                        at: Utc::now(),
                        active: true,
                    },
                );
            },
            Some(AuditInput::info("resource.assign", "Recurso asignado").meta(meta)),
        )
    }

    pub fn unassign_resource(&self, resource_id: &str) -> Result<()> {
        self.transact(
            |d| {
                let Some(r) = d.resources.iter_mut().find(|x| x.id == resource_id) else {
                    return;
                };
                r.status = "Disponible".into();
                r.updated_at = Utc::now();
                for a in d
                    .assignments
                    .iter_mut()
                    .filter(|a| a.resource_id == resource_id && a.active)
                {
                    a.active = false;
                }
            },
            Some(
                AuditInput::info("resource.unassign", "Recurso liberado")
                    .meta(json!({ "resourceId": resource_id })),
            ),
        )
    }

    // ── incidents ────────────────────────────────────────────────────────

    pub fn create_incident(&self, payload: NewIncident) -> Result<Incident> {
        let title = payload.title.trim().to_string();
        if title.is_empty() {
            return Err(StoreError::Validation("Escribe un título claro.".into()));
        }

        let inc = Incident {
            id: uid("inc"),
            title,
            category: payload.category,
            priority: payload.priority,
            status: payload.status.unwrap_or_else(|| "Abierto".into()),
            description: payload.description.unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            assigned_to: payload.assigned_to.unwrap_or_default(),
            related_campaign_id: payload.related_campaign_id.unwrap_or_default(),
        };
        let out = inc.clone();
        self.transact(
            move |d| d.incidents.insert(0, inc),
            Some(
                AuditInput::warn("incident.create", format!("Incidente creado: {}", out.title))
                    .meta(json!({ "incidentId": out.id })),
            ),
        )?;
        Ok(out)
    }

    pub fn update_incident(&self, id: &str, patch: IncidentPatch) -> Result<()> {
        self.transact(
            |d| {
                let Some(inc) = d.incidents.iter_mut().find(|x| x.id == id) else { return };
                if let Some(v) = patch.title {
                    inc.title = v;
                }
                if let Some(v) = patch.category {
                    inc.category = v;
                }
                if let Some(v) = patch.priority {
                    inc.priority = v;
                }
                if let Some(v) = patch.status {
                    inc.status = v;
                }
                if let Some(v) = patch.description {
                    inc.description = v;
                }
                if let Some(v) = patch.assigned_to {
                    inc.assigned_to = v;
                }
                if let Some(v) = patch.related_campaign_id {
                    inc.related_campaign_id = v;
                }
                inc.updated_at = Utc::now();
            },
            Some(
                AuditInput::info("incident.update", "Incidente actualizado")
                    .meta(json!({ "incidentId": id })),
            ),
        )
    }

    // ── KPI catalog ──────────────────────────────────────────────────────

    pub fn create_kpi_def(&self, payload: NewKpiDef) -> Result<KpiDef> {
        let code = payload.code.trim().to_uppercase();
        let name = payload.name.trim().to_string();
        if code.is_empty() || name.is_empty() {
            return Err(StoreError::Validation(
                "Código y nombre son obligatorios.".into(),
            ));
        }

        let def = KpiDef {
            id: uid("kpi"),
            code,
            name,
            frequency: payload.frequency.unwrap_or_else(|| "Diaria".into()),
            owner: payload.owner.unwrap_or_else(|| "Data".into()),
            formula: payload.formula.unwrap_or_default(),
            description: payload.description.unwrap_or_default(),
            created_at: Utc::now(),
        };
        let out = def.clone();
        self.transact(
            move |d| d.kpi_catalog.insert(0, def),
            Some(
                AuditInput::info("kpi.create", format!("KPI agregado: {}", out.code))
                    .meta(json!({ "kpiId": out.id })),
            ),
        )?;
        Ok(out)
    }

    // ── persistence ──────────────────────────────────────────────────────

    fn persist_db(&self, db: &Db) -> Result<()> {
        let raw = serde_json::to_string(db).map_err(|e| StoreError::Storage(e.into()))?;
        self.storage.set(DB_KEY, &raw).map_err(StoreError::Storage)
    }

    fn persist_settings(&self, settings: &Settings) -> Result<()> {
        let raw =
            serde_json::to_string(settings).map_err(|e| StoreError::Storage(e.into()))?;
        self.storage.set(SETTINGS_KEY, &raw).map_err(StoreError::Storage)
    }
}

/// Prepend an audit entry and trim to the rolling cap. Actor resolution:
/// explicit actor, else session email, else `"sistema"`.
fn push_audit(db: &mut Db, entry: AuditInput, session: Option<&Session>) {
    let actor = entry
        .actor
        .or_else(|| session.map(|s| s.email.clone()))
        .unwrap_or_else(|| "sistema".into());
    db.audit_logs.insert(
        0,
        AuditLog {
            id: uid("log"),
            at: Utc::now(),
            actor,
            severity: entry.severity,
            kind: entry.kind,
            message: entry.message,
            meta: entry.meta,
        },
    );
    db.audit_logs.truncate(AUDIT_CAP);
}

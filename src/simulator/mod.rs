// src/simulator/mod.rs
//
// "Real-time" demo feed: a recurring task that advances KPI series, perturbs
// connector/ETL health, appends synthetic interactions, occasionally resolves
// incidents, and raises cooldown-gated alert notifications. Best-effort and
// decorative: a failed tick is logged and abandoned, the next tick starts
// fresh.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::models::{Campaign, Db, Interaction, KpiRecord, Notification};
use crate::store::{uid, AuditInput, Result, Store};

pub const TICK_INTERVAL: StdDuration = StdDuration::from_secs(5);
const ALERT_COOLDOWN_MINUTES: i64 = 6;

const KPI_HARD_CAP: usize = 5000;
const KPI_TRIM_TO: usize = 4200;
const INTERACTION_CAP: usize = 180;
const NOTIFICATION_CAP: usize = 80;

/// A threshold rule that tripped for a campaign on this tick. Keyed
/// `<rule>_<campaignId>` for cooldown suppression.
#[derive(Debug, Clone)]
pub struct AlertCandidate {
    pub key: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub meta: serde_json::Value,
}

/// Minimum interval between repeated firings of the same alert key. Held in
/// process memory only; survives simulator stop/start, lost on process exit.
pub struct AlertGate {
    cooldown: Duration,
    last_fired: HashMap<String, DateTime<Utc>>,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last_fired: HashMap::new() }
    }

    /// True if the key may fire at `now`; records the firing when admitted.
    pub fn admit(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_fired.get(key) {
            if now.signed_duration_since(*last) < self.cooldown {
                return false;
            }
        }
        self.last_fired.insert(key.to_string(), now);
        true
    }
}

struct SimState {
    task: Option<JoinHandle<()>>,
    gate: AlertGate,
    rng: StdRng,
}

pub struct Simulator {
    store: Arc<Store>,
    state: Mutex<SimState>,
    weak: Weak<Simulator>,
}

impl Simulator {
    pub fn new(store: Arc<Store>) -> Arc<Self> {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Seeded constructor for reproducible runs.
    pub fn with_rng(store: Arc<Store>, rng: StdRng) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            store,
            state: Mutex::new(SimState {
                task: None,
                gate: AlertGate::new(Duration::minutes(ALERT_COOLDOWN_MINUTES)),
                rng,
            }),
            weak: weak.clone(),
        })
    }

    /// Start iff a session exists and `settings.realtime` is on; stop
    /// otherwise. Call after any session or settings change.
    pub fn sync(&self) {
        let enabled = self.store.session().is_some() && self.store.settings().realtime;
        if enabled {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Idempotent; a second start while running is a no-op.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if state.task.is_some() {
            return;
        }
        let Some(sim) = self.weak.upgrade() else { return };
        state.task = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + TICK_INTERVAL;
            let mut interval = tokio::time::interval_at(start, TICK_INTERVAL);
            loop {
                interval.tick().await;
                sim.tick();
            }
        }));
        tracing::debug!("simulator started");
    }

    /// Idempotent. After this returns no new tick begins; a tick already in
    /// flight re-checks enablement and bails out on its own.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(task) = state.task.take() {
            task.abort();
            tracing::debug!("simulator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().task.is_some()
    }

    /// One simulation step. Public so tests and headless drivers can advance
    /// the feed without the timer.
    pub fn tick(&self) {
        if let Err(err) = self.run_tick() {
            tracing::warn!(error = %err, "simulator tick abandoned");
        }
    }

    fn run_tick(&self) -> Result<()> {
        // tolerate the interval firing once after disablement
        if self.store.session().is_none() || !self.store.settings().realtime {
            return Ok(());
        }

        // the RNG is taken out for the duration of the tick so no lock is
        // held across the transaction or event delivery
        let mut rng = self.state.lock().rng.clone();
        let now = Utc::now();
        let mut alerts: Vec<AlertCandidate> = Vec::new();

        self.store.transact(
            |d| {
                advance_kpis(d, &mut rng, now, &mut alerts);
                drift_integrations(d, &mut rng);
                redraw_pipelines(d, &mut rng, now);
                spawn_interactions(d, &mut rng, now);
                autoresolve_incidents(d, &mut rng, now);
            },
            None,
        )?;

        self.state.lock().rng = rng;

        for alert in alerts {
            self.maybe_notify(alert, now)?;
        }
        Ok(())
    }

    /// Cooldown state lives outside the DB, so the notification write is a
    /// second, small transaction rather than part of the bulk one.
    fn maybe_notify(&self, alert: AlertCandidate, now: DateTime<Utc>) -> Result<()> {
        if !self.state.lock().gate.admit(&alert.key, now) {
            return Ok(());
        }

        let audit = AuditInput::info("notify.auto", format!("Alerta: {}", alert.title))
            .meta(alert.meta.clone());
        let n = Notification {
            id: uid("ntf"),
            at: now,
            read: false,
            kind: alert.kind,
            title: alert.title,
            message: alert.message,
            meta: alert.meta,
        };
        self.store.transact(
            move |d| {
                d.notifications.insert(0, n);
                d.notifications.truncate(NOTIFICATION_CAP);
            },
            Some(audit),
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tick steps
// ─────────────────────────────────────────────────────────────────────────────

/// Most recent record for a campaign. Reverse scan from the end of the
/// append-only list — the document's only query pattern, O(n) per lookup.
pub fn latest_kpi<'a>(db: &'a Db, campaign_id: &str) -> Option<&'a KpiRecord> {
    db.kpi_records.iter().rev().find(|r| r.campaign_id == campaign_id)
}

fn advance_kpis(
    db: &mut Db,
    rng: &mut StdRng,
    now: DateTime<Utc>,
    alerts: &mut Vec<AlertCandidate>,
) {
    let active: Vec<Campaign> = db
        .campaigns
        .iter()
        .filter(|c| c.status == "Activa")
        .cloned()
        .collect();

    for c in &active {
        let rec = next_kpi(c, latest_kpi(db, &c.id), rng, now);
        alerts.extend(evaluate_alerts(c, &rec));
        db.kpi_records.push(rec);
        if db.kpi_records.len() > KPI_HARD_CAP {
            let excess = db.kpi_records.len() - KPI_TRIM_TO;
            db.kpi_records.drain(..excess);
        }
    }
}

/// Next synthetic point: volumes jitter multiplicatively off the previous
/// record, quality metrics revert toward campaign targets with bounded noise.
pub fn next_kpi(
    c: &Campaign,
    last: Option<&KpiRecord>,
    rng: &mut StdRng,
    now: DateTime<Utc>,
) -> KpiRecord {
    let t = &c.targets;
    let base_contacts = last.map(|r| r.contacts as f64).unwrap_or(120.0);
    let base_answered = last
        .map(|r| r.answered as f64)
        .unwrap_or((base_contacts * 0.9).round());

    let contacts = (base_contacts * (0.88 + rng.gen::<f64>() * 0.24)).round().max(0.0);
    let answered = (base_answered * (0.90 + rng.gen::<f64>() * 0.22))
        .round()
        .clamp(0.0, contacts);
    let abandoned = (contacts - answered).max(0.0);

    let sla_target = if t.sla > 0.0 { t.sla } else { 0.82 };
    let csat_target = if t.csat > 0.0 { t.csat } else { 86.0 };
    let aht_target = if t.aht > 0.0 { t.aht } else { 330.0 };

    let sla = (sla_target + (rng.gen::<f64>() - 0.5) * 0.10).clamp(0.55, 0.95);
    let csat = (csat_target + (rng.gen::<f64>() - 0.5) * 10.0).clamp(65.0, 95.0).round();
    let nps = (18.0 + (rng.gen::<f64>() - 0.5) * 44.0).clamp(-45.0, 70.0).round();
    let aht = (aht_target + (rng.gen::<f64>() - 0.5) * 90.0).clamp(200.0, 540.0).round();
    let conversion = if t.conversion > 0.0 {
        (t.conversion + (rng.gen::<f64>() - 0.5) * 0.08).clamp(0.04, 0.30)
    } else {
        0.0
    };
    let recovery = if t.recovery > 0.0 {
        (t.recovery + (rng.gen::<f64>() - 0.5) * 0.10).clamp(0.06, 0.42)
    } else {
        0.0
    };

    KpiRecord {
        id: uid("kpir"),
        campaign_id: c.id.clone(),
        at: now,
        contacts: contacts as i32,
        answered: answered as i32,
        abandoned: abandoned as i32,
        sla,
        aht: aht as i32,
        csat: csat as i32,
        nps: nps as i32,
        conversion,
        recovery,
    }
}

/// Threshold rules against the just-generated record: SLA more than 6 pp
/// under target, CSAT more than 4 pts under, AHT more than 55 s over.
pub fn evaluate_alerts(c: &Campaign, rec: &KpiRecord) -> Vec<AlertCandidate> {
    let t = &c.targets;
    let mut out = Vec::new();

    if t.sla > 0.0 && rec.sla < t.sla - 0.06 {
        out.push(AlertCandidate {
            key: format!("sla_{}", c.id),
            kind: "warn".into(),
            title: "SLA en riesgo".into(),
            message: format!(
                "{}: SLA {}% (meta {}%)",
                c.name,
                (rec.sla * 100.0).round(),
                (t.sla * 100.0).round()
            ),
            meta: json!({ "campaignId": c.id }),
        });
    }
    if t.csat > 0.0 && (rec.csat as f64) < t.csat - 4.0 {
        out.push(AlertCandidate {
            key: format!("csat_{}", c.id),
            kind: "warn".into(),
            title: "CSAT bajo".into(),
            message: format!("{}: CSAT {} (meta {})", c.name, rec.csat, t.csat),
            meta: json!({ "campaignId": c.id }),
        });
    }
    if t.aht > 0.0 && (rec.aht as f64) > t.aht + 55.0 {
        out.push(AlertCandidate {
            key: format!("aht_{}", c.id),
            kind: "warn".into(),
            title: "TMO elevado".into(),
            message: format!(
                "{}: TMO {} (meta {})",
                c.name,
                mmss(rec.aht),
                mmss(t.aht as i32)
            ),
            meta: json!({ "campaignId": c.id }),
        });
    }
    out
}

fn mmss(seconds: i32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn drift_integrations(db: &mut Db, rng: &mut StdRng) {
    for x in &mut db.integrations {
        let roll: f64 = rng.gen();
        if x.status == "Conectado" && roll < 0.03 {
            x.status = "Degradado".into();
        } else if x.status == "Degradado" && roll < 0.10 {
            x.status = "Conectado".into();
        } else if x.status == "Desconectado" && roll < 0.06 {
            x.status = "Conectado".into();
        }

        x.health += (rng.gen::<f64>() - 0.5) * 6.0;
        x.health = match x.status.as_str() {
            "Desconectado" => x.health.clamp(35.0, 55.0),
            "Degradado" => x.health.clamp(55.0, 85.0),
            _ => x.health.clamp(78.0, 99.0),
        };
    }
}

fn redraw_pipelines(db: &mut Db, rng: &mut StdRng, now: DateTime<Utc>) {
    for p in &mut db.pipelines {
        let roll: f64 = rng.gen();
        p.status = if roll < 0.78 {
            "OK".into()
        } else if roll < 0.92 {
            "Retrasado".into()
        } else {
            "Error".into()
        };
        p.last_run_at = now;
        p.rows = (800.0 + rng.gen::<f64>() * 12000.0).round() as i32;
        p.duration_sec = (30.0 + rng.gen::<f64>() * 160.0).round() as i32;
    }
}

fn spawn_interactions(db: &mut Db, rng: &mut StdRng, now: DateTime<Utc>) {
    let channels = ["Voz", "Chat", "WhatsApp", "Email"];
    let customers = [
        "Ana", "Juan", "Claudia", "Ricardo", "María", "Gustavo", "Erika", "José", "Sonia",
        "Felipe", "Roxana", "Héctor", "Paolo", "Estefanía",
    ];
    let active: Vec<String> = db
        .campaigns
        .iter()
        .filter(|c| c.status == "Activa")
        .map(|c| c.id.clone())
        .collect();
    if active.is_empty() {
        return;
    }

    let add_count = if rng.gen::<f64>() < 0.55 {
        1
    } else if rng.gen::<f64>() < 0.85 {
        2
    } else {
        3
    };
    for _ in 0..add_count {
        let campaign_id = active[rng.gen_range(0..active.len())].clone();
        let initial = (b'A' + rng.gen_range(0..26u8)) as char;
        db.interactions.insert(
            0,
            Interaction {
                id: uid("cx"),
                campaign_id,
                channel: channels[rng.gen_range(0..channels.len())].into(),
                customer: format!(
                    "{} {initial}.",
                    customers[rng.gen_range(0..customers.len())]
                ),
                status: if rng.gen::<f64>() < 0.66 {
                    "En cola".into()
                } else {
                    "En curso".into()
                },
                priority: if rng.gen::<f64>() < 0.10 {
                    "Alta".into()
                } else if rng.gen::<f64>() < 0.40 {
                    "Media".into()
                } else {
                    "Baja".into()
                },
                created_at: now,
                updated_at: now,
                summary: "Interacción generada en modo demo.".into(),
            },
        );
    }
    db.interactions.truncate(INTERACTION_CAP);
}

fn autoresolve_incidents(db: &mut Db, rng: &mut StdRng, now: DateTime<Utc>) {
    for inc in &mut db.incidents {
        if inc.status == "En curso" && rng.gen::<f64>() < 0.08 {
            inc.status = "Resuelto".into();
            inc.updated_at = now;
        }
    }
}

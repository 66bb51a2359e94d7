// src/store/seed.rs
//
// Deterministic demo document. The fixed seed keeps entity counts and shapes
// stable across reseeds; ids are fresh per document.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;

use crate::models::{
    Agent, Assignment, AuditLog, Campaign, CampaignTargets, Db, DbMeta, Incident, Integration,
    Interaction, KpiDef, KpiRecord, Notification, Pipeline, QualityEvaluation, Resource, User,
    SCHEMA_VERSION,
};
use crate::store::{sha256_hex, uid};

const SEED: u64 = 202502;
const DEMO_PASSWORD: &str = "Fortel2025!";

pub fn seed_db(now: DateTime<Utc>) -> Db {
    let mut rng = StdRng::seed_from_u64(SEED);
    let password_hash = sha256_hex(DEMO_PASSWORD);

    let users = vec![
        mk_user("u_admin", "Administrador", "admin@demo.com", "Admin", &password_hash),
        mk_user("u_sup", "Supervisor de Campaña", "supervisor@demo.com", "Supervisor", &password_hash),
        mk_user("u_data", "Analista de Datos", "analista@demo.com", "Analista", &password_hash),
        mk_user("u_ops", "Operador", "operador@demo.com", "Operador", &password_hash),
    ];

    let campaigns = vec![
        Campaign {
            id: "camp_pe_ventas".into(),
            name: "Ventas Fibra Hogar".into(),
            client: "Telco Andina".into(),
            country: "Perú".into(),
            channels: vec!["Voz".into(), "WhatsApp".into(), "Chat".into()],
            status: "Activa".into(),
            start_date: days_ago(now, 42),
            owner: "Operaciones".into(),
            targets: CampaignTargets { sla: 0.82, csat: 86.0, aht: 310.0, conversion: 0.14, recovery: 0.0 },
            notes: "Campaña comercial con foco en conversión y cumplimiento de SLA.".into(),
            created_at: now,
            updated_at: now,
        },
        Campaign {
            id: "camp_cl_soporte".into(),
            name: "Soporte Técnico TV".into(),
            client: "TeleSur".into(),
            country: "Chile".into(),
            channels: vec!["Voz".into(), "Chat".into(), "Email".into()],
            status: "Activa".into(),
            start_date: days_ago(now, 70),
            owner: "Operaciones".into(),
            targets: CampaignTargets { sla: 0.86, csat: 88.0, aht: 340.0, conversion: 0.0, recovery: 0.0 },
            notes: "Soporte técnico con énfasis en FCR y experiencia del cliente.".into(),
            created_at: now,
            updated_at: now,
        },
        Campaign {
            id: "camp_mx_cobranza".into(),
            name: "Cobranzas Retail".into(),
            client: "Grupo Retail MX".into(),
            country: "México".into(),
            channels: vec!["Voz".into(), "Email".into()],
            status: "Activa".into(),
            start_date: days_ago(now, 18),
            owner: "Operaciones".into(),
            targets: CampaignTargets { sla: 0.78, csat: 80.0, aht: 360.0, conversion: 0.0, recovery: 0.22 },
            notes: "Gestión de recupero con segmentación por mora y promesas de pago.".into(),
            created_at: now,
            updated_at: now,
        },
        Campaign {
            id: "camp_bo_onboarding".into(),
            name: "Onboarding Digital".into(),
            client: "Fintech BOL".into(),
            country: "Bolivia".into(),
            channels: vec!["Chat".into(), "Email".into()],
            status: "Planificada".into(),
            start_date: days_ago(now, -7),
            owner: "Operaciones".into(),
            targets: CampaignTargets { sla: 0.84, csat: 90.0, aht: 280.0, conversion: 0.0, recovery: 0.0 },
            notes: "Campaña en preparación: accesos, capacitación y pruebas de integración.".into(),
            created_at: now,
            updated_at: now,
        },
    ];

    let names = [
        "Valeria R.", "Miguel A.", "Sofía P.", "Carlos M.", "Daniela C.", "Jorge L.",
        "Andrea V.", "Pablo S.", "Camila G.", "Luis F.", "Mariana T.", "Renzo H.",
        "Gabriela N.", "Sebastián D.", "Lucía K.", "Diego B.", "Paula E.", "Kevin J.",
        "Rosa I.", "Marco Z.",
    ];
    let mut agents = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let team = match i % 3 {
            0 => "Team Norte",
            1 => "Team Centro",
            _ => "Team Sur",
        };
        let camp = if i < 8 {
            "camp_pe_ventas"
        } else if i < 14 {
            "camp_cl_soporte"
        } else {
            "camp_mx_cobranza"
        };
        agents.push(Agent {
            id: format!("agt_{}", i + 1),
            name: (*name).into(),
            team: team.into(),
            campaign_id: camp.into(),
            status: if i % 9 == 0 { "En descanso".into() } else { "Activo".into() },
            hired_at: days_ago(now, 200 + rng.gen_range(0..400)),
        });
    }

    let types = ["PC", "Headset", "Teléfono", "Monitor", "Teclado"];
    let locations = ["Lima", "Santiago", "CDMX", "Remoto"];
    let status_pool = ["Disponible", "Disponible", "Disponible", "Asignado", "Mantenimiento"];
    let mut resources = Vec::with_capacity(42);
    for i in 1..=42 {
        let kind = types[rng.gen_range(0..types.len())];
        let prefix: String = kind.chars().take(2).collect::<String>().to_uppercase();
        let status = status_pool[rng.gen_range(0..status_pool.len())];
        resources.push(Resource {
            id: format!("res_{i}"),
            kind: kind.into(),
            code: format!("{prefix}-{i:03}"),
            model: match kind {
                "PC" => "Dell OptiPlex 7090",
                "Headset" => "Jabra Evolve 20",
                "Teléfono" => "Yealink T46",
                _ => "Genérico",
            }
            .into(),
            status: status.into(),
            location: locations[rng.gen_range(0..locations.len())].into(),
            notes: if status == "Mantenimiento" {
                "Revisión preventiva programada.".into()
            } else {
                String::new()
            },
            created_at: now,
            updated_at: now,
        });
    }

    let mut assignments = Vec::new();
    for (idx, r) in resources
        .iter()
        .filter(|r| r.status == "Asignado")
        .take(18)
        .enumerate()
    {
        let ag = &agents[idx % agents.len()];
        assignments.push(Assignment {
            id: uid("asg"),
            resource_id: r.id.clone(),
            agent_id: ag.id.clone(),
            campaign_id: ag.campaign_id.clone(),
            at: now - Duration::days(5 + rng.gen_range(0..30)),
            active: true,
        });
    }

    let integrations = vec![
        mk_connector("int_crm", "CRM por campaña (SaaS)", "Conectado", now, &mut rng),
        mk_connector("int_voip", "Telefonía IP / VoIP", "Conectado", now, &mut rng),
        mk_connector("int_omni", "Plataforma Omnicanal", "Conectado", now, &mut rng),
        mk_connector("int_cal", "Herramientas de Calidad", "Degradado", now, &mut rng),
        mk_connector("int_rrhh", "RR.HH.", "Conectado", now, &mut rng),
        mk_connector("int_wfm", "WFM (Workforce)", "Desconectado", now, &mut rng),
    ];

    let pipelines = vec![
        mk_pipeline("etl_crm", "ETL CRM → DWH", "CRM", "DWH", "cada 15 min", now, &mut rng),
        mk_pipeline("etl_voip", "ETL VoIP → DWH", "VoIP", "DWH", "cada 10 min", now, &mut rng),
        mk_pipeline("etl_omni", "ETL Omnicanal → DWH", "Omnicanal", "DWH", "cada 5 min", now, &mut rng),
        mk_pipeline("etl_quality", "ETL Calidad → DWH", "Calidad", "DWH", "cada 30 min", now, &mut rng),
        mk_pipeline("etl_rrhh", "ETL RR.HH. → DWH", "RR.HH.", "DWH", "cada 1 h", now, &mut rng),
        mk_pipeline("etl_wfm", "ETL WFM → DWH", "WFM", "DWH", "cada 30 min", now, &mut rng),
    ];

    let kpi_catalog = vec![
        mk_kpi("SLA", "Nivel de servicio", "Cada 15 min", "Operaciones",
            "SLA = atendidas_en_objetivo / atendidas_totales",
            "Mide cumplimiento de atención en el tiempo comprometido.", now),
        mk_kpi("TMO", "Tiempo medio de operación", "Cada 15 min", "Operaciones",
            "TMO = tiempo_total / interacciones",
            "Equivalente a AHT; incluye conversación + post-gestión.", now),
        mk_kpi("CSAT", "Satisfacción del cliente", "Diaria", "Calidad",
            "CSAT = % respuestas 4-5", "Encuesta post interacción.", now),
        mk_kpi("NPS", "Net Promoter Score", "Semanal", "Calidad",
            "NPS = %promotores - %detractores", "Lealtad percibida del cliente.", now),
        mk_kpi("CONV", "Conversión", "Diaria", "Comercial",
            "Conversión = ventas / contactos efectivos", "Eficiencia de ventas.", now),
        mk_kpi("REC", "Recupero", "Diaria", "Cobranzas",
            "Recupero = monto_recuperado / monto_gestionado", "Efectividad de cobranzas.", now),
        mk_kpi("FCR", "Resolución en el primer contacto", "Diaria", "Calidad",
            "FCR = casos_resueltos_1_contacto / casos_totales", "Eficacia de soporte.", now),
    ];

    let mut quality_evaluations = Vec::with_capacity(22);
    for _ in 0..22 {
        let ag = &agents[rng.gen_range(0..agents.len())];
        let score = (72.0 + rng.gen::<f64>() * 26.0).round() as i32;
        quality_evaluations.push(QualityEvaluation {
            id: uid("qa"),
            campaign_id: ag.campaign_id.clone(),
            agent_id: ag.id.clone(),
            at: now - Duration::days(rng.gen_range(0..25)),
            score,
            checklist: [
                ("saludo".to_string(), score > 78),
                ("validacion".to_string(), score > 75),
                ("empatia".to_string(), score > 80),
                ("solucion".to_string(), score > 77),
                ("cierre".to_string(), score > 74),
            ]
            .into_iter()
            .collect(),
            notes: if score < 80 {
                "Refuerzo en empatía y estructura de cierre.".into()
            } else {
                "Buen manejo de la guía y validaciones.".into()
            },
        });
    }

    let incidents = vec![
        Incident {
            id: "inc_001".into(),
            title: "Latencia elevada en plataforma omnicanal".into(),
            category: "Conectividad".into(),
            priority: "Alta".into(),
            status: "En curso".into(),
            description: "Afecta chats y WhatsApp en picos de tráfico.".into(),
            created_at: now - Duration::days(1),
            updated_at: now,
            assigned_to: "TI / Redes".into(),
            related_campaign_id: "camp_pe_ventas".into(),
        },
        Incident {
            id: "inc_002".into(),
            title: "Usuarios sin acceso a CRM (error 403)".into(),
            category: "Accesos".into(),
            priority: "Media".into(),
            status: "Abierto".into(),
            description: "Nuevas altas sin permisos por rol.".into(),
            created_at: now,
            updated_at: now,
            assigned_to: "TI / Sistemas".into(),
            related_campaign_id: "camp_bo_onboarding".into(),
        },
        Incident {
            id: "inc_003".into(),
            title: "Headsets con ruido intermitente (lote)".into(),
            category: "Activos".into(),
            priority: "Baja".into(),
            status: "Resuelto".into(),
            description: "Se cambió lote y se ajustó configuración de audio.".into(),
            created_at: now - Duration::days(9),
            updated_at: now - Duration::days(3),
            assigned_to: "Soporte".into(),
            related_campaign_id: String::new(),
        },
    ];

    let channels = ["Voz", "Chat", "WhatsApp", "Email"];
    let customer_names = [
        "Ana", "Juan", "Claudia", "Ricardo", "María", "Gustavo", "Erika", "José", "Sonia",
        "Felipe", "Roxana", "Héctor",
    ];
    let mut interactions = Vec::with_capacity(34);
    for _ in 0..34 {
        let camp = &campaigns[rng.gen_range(0..3)];
        let ch = channels[rng.gen_range(0..channels.len())];
        let initial = (b'A' + rng.gen_range(0..26u8)) as char;
        interactions.push(Interaction {
            id: uid("cx"),
            campaign_id: camp.id.clone(),
            channel: ch.into(),
            customer: format!(
                "{} {initial}.",
                customer_names[rng.gen_range(0..customer_names.len())]
            ),
            status: if rng.gen::<f64>() < 0.58 {
                "Resuelto".into()
            } else if rng.gen::<f64>() < 0.82 {
                "En curso".into()
            } else {
                "En cola".into()
            },
            priority: if rng.gen::<f64>() < 0.12 {
                "Alta".into()
            } else if rng.gen::<f64>() < 0.42 {
                "Media".into()
            } else {
                "Baja".into()
            },
            created_at: now - Duration::days(rng.gen_range(0..6)),
            updated_at: now,
            summary: match ch {
                "Voz" => "Consulta general / validación.",
                "Chat" => "Soporte y seguimiento.",
                "WhatsApp" => "Atención rápida y derivación.",
                _ => "Correo con evidencias adjuntas.",
            }
            .into(),
        });
    }

    // 48-hour history, one point every 2 hours per active campaign
    let points = 24;
    let mut kpi_records = Vec::new();
    for (idx, c) in campaigns.iter().filter(|c| c.status == "Activa").enumerate() {
        let base_vol = match idx {
            0 => 140.0,
            1 => 110.0,
            _ => 90.0,
        };
        let base_sla = c.targets.sla;
        let base_csat = c.targets.csat - 2.0;
        for i in (0..points).rev() {
            let at = now - Duration::hours(i as i64 * 2);
            let wave = ((i as f64 / points as f64) * std::f64::consts::TAU).sin() * 0.08;
            let vol = (base_vol * (0.72 + rng.gen::<f64>() * 0.65) * (1.0 + wave)).round();
            let answered = (vol * (0.86 + rng.gen::<f64>() * 0.10)).round();
            let abandoned = (vol - answered).max(0.0);
            let sla =
                (base_sla + wave + (rng.gen::<f64>() - 0.5) * 0.06).clamp(0.62, 0.95);
            let aht = (c.targets.aht + (rng.gen::<f64>() - 0.5) * 70.0 + wave * 50.0)
                .clamp(210.0, 520.0)
                .round();
            let csat = (base_csat + (rng.gen::<f64>() - 0.5) * 8.0 + wave * 6.0)
                .clamp(70.0, 95.0)
                .round();
            let nps = (15.0 + (rng.gen::<f64>() - 0.5) * 40.0 + wave * 20.0)
                .clamp(-40.0, 65.0)
                .round();
            let conversion = if c.targets.conversion > 0.0 {
                (c.targets.conversion + (rng.gen::<f64>() - 0.5) * 0.06 + wave * 0.03)
                    .clamp(0.04, 0.26)
            } else {
                0.0
            };
            let recovery = if c.targets.recovery > 0.0 {
                (c.targets.recovery + (rng.gen::<f64>() - 0.5) * 0.08 + wave * 0.03)
                    .clamp(0.06, 0.40)
            } else {
                0.0
            };
            kpi_records.push(KpiRecord {
                id: uid("kpir"),
                campaign_id: c.id.clone(),
                at,
                contacts: vol as i32,
                answered: answered as i32,
                abandoned: abandoned as i32,
                sla,
                aht: aht as i32,
                csat: csat as i32,
                nps: nps as i32,
                conversion,
                recovery,
            });
        }
    }

    let notifications = vec![
        Notification {
            id: uid("ntf"),
            at: now - Duration::hours(2),
            read: false,
            kind: "warn".into(),
            title: "Calidad degradada".into(),
            message: "La integración con Herramientas de Calidad reporta errores intermitentes."
                .into(),
            meta: json!({ "integrationId": "int_cal" }),
        },
        Notification {
            id: uid("ntf"),
            at: now - Duration::hours(4),
            read: false,
            kind: "info".into(),
            title: "ETL Omnicanal".into(),
            message: "Carga completada. Nuevos registros disponibles para dashboard.".into(),
            meta: json!({ "pipelineId": "etl_omni" }),
        },
    ];

    let audit_logs = vec![AuditLog {
        id: uid("log"),
        at: now,
        actor: "sistema".into(),
        severity: "info".into(),
        kind: "seed".into(),
        message: "Base demo inicializada.".into(),
        meta: json!({}),
    }];

    Db {
        meta: DbMeta { version: SCHEMA_VERSION, seeded_at: now },
        users,
        campaigns,
        agents,
        resources,
        assignments,
        kpi_records,
        interactions,
        quality_evaluations,
        incidents,
        integrations,
        pipelines,
        kpi_catalog,
        notifications,
        audit_logs,
    }
}

fn mk_user(id: &str, name: &str, email: &str, role: &str, password_hash: &str) -> User {
    User {
        id: id.into(),
        name: name.into(),
        email: email.into(),
        role: role.into(),
        password_hash: password_hash.into(),
    }
}

fn mk_connector(
    id: &str,
    name: &str,
    status: &str,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Integration {
    let last = now - Duration::hours(rng.gen_range(0..6));
    Integration {
        id: id.into(),
        name: name.into(),
        status: status.into(),
        last_sync_at: last,
        next_sync_at: last + Duration::hours(1),
        health: match status {
            "Conectado" => 92.0 + rng.gen_range(0..6) as f64,
            "Degradado" => 72.0 + rng.gen_range(0..10) as f64,
            _ => 44.0 + rng.gen_range(0..12) as f64,
        },
        endpoint: match id {
            "int_crm" => "/api/crm",
            "int_voip" => "/api/voip",
            "int_omni" => "/api/omni",
            "int_cal" => "/api/quality",
            "int_rrhh" => "/api/hr",
            _ => "/api/wfm",
        }
        .into(),
        notes: match status {
            "Desconectado" => "Pendiente de credenciales / whitelisting.",
            "Degradado" => "Errores 5xx intermitentes.",
            _ => "Operativo.",
        }
        .into(),
    }
}

fn mk_pipeline(
    id: &str,
    name: &str,
    source: &str,
    dest: &str,
    schedule: &str,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Pipeline {
    let roll: f64 = rng.gen();
    Pipeline {
        id: id.into(),
        name: name.into(),
        source: source.into(),
        dest: dest.into(),
        schedule: schedule.into(),
        last_run_at: now - Duration::hours(rng.gen_range(0..4)),
        status: if roll < 0.78 {
            "OK".into()
        } else if roll < 0.92 {
            "Retrasado".into()
        } else {
            "Error".into()
        },
        rows: (1200.0 + rng.gen::<f64>() * 9200.0).round() as i32,
        duration_sec: (35.0 + rng.gen::<f64>() * 140.0).round() as i32,
    }
}

fn mk_kpi(
    code: &str,
    name: &str,
    frequency: &str,
    owner: &str,
    formula: &str,
    description: &str,
    now: DateTime<Utc>,
) -> KpiDef {
    KpiDef {
        id: uid("kpi"),
        code: code.into(),
        name: name.into(),
        frequency: frequency.into(),
        owner: owner.into(),
        formula: formula.into(),
        description: description.into(),
        created_at: now,
    }
}

fn days_ago(now: DateTime<Utc>, days: i64) -> NaiveDate {
    (now - Duration::days(days)).date_naive()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn seed_is_deterministic_in_shape() {
        let now = Utc::now();
        let a = seed_db(now);
        let b = seed_db(now);

        assert_eq!(a.meta.version, SCHEMA_VERSION);
        assert_eq!(a.users.len(), 4);
        assert_eq!(a.campaigns.len(), 4);
        assert_eq!(a.agents.len(), 20);
        assert_eq!(a.resources.len(), 42);
        assert_eq!(a.integrations.len(), 6);
        assert_eq!(a.pipelines.len(), 6);
        assert_eq!(a.kpi_catalog.len(), 7);
        assert_eq!(a.quality_evaluations.len(), 22);
        assert_eq!(a.incidents.len(), 3);
        assert_eq!(a.interactions.len(), 34);
        // 24 points per active campaign, 3 active in the seed
        assert_eq!(a.kpi_records.len(), 72);
        assert_eq!(a.notifications.len(), 2);
        assert_eq!(a.audit_logs.len(), 1);

        // same shape on every reseed
        assert_eq!(a.resources.len(), b.resources.len());
        assert_eq!(a.assignments.len(), b.assignments.len());
        let codes_a: Vec<_> = a.resources.iter().map(|r| r.code.clone()).collect();
        let codes_b: Vec<_> = b.resources.iter().map(|r| r.code.clone()).collect();
        assert_eq!(codes_a, codes_b);
    }

    #[test]
    fn seeded_assignments_are_exclusive_per_resource() {
        let db = seed_db(Utc::now());
        for a in &db.assignments {
            let actives = db
                .assignments
                .iter()
                .filter(|x| x.resource_id == a.resource_id && x.active)
                .count();
            assert_eq!(actives, 1, "resource {} has {actives} active", a.resource_id);
        }
    }

    #[test]
    fn seeded_history_respects_ranges() {
        let db = seed_db(Utc::now());
        for r in &db.kpi_records {
            assert!((0.62..=0.95).contains(&r.sla));
            assert!((210..=520).contains(&r.aht));
            assert!((70..=95).contains(&r.csat));
            assert!((-40..=65).contains(&r.nps));
            assert!(r.abandoned >= 0);
            assert!(r.answered <= r.contacts);
        }
    }
}

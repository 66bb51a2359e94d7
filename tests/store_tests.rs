// tests/store_tests.rs

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use sigcr_core::models::Settings;
use sigcr_core::storage::{MemoryStorage, Storage};
use sigcr_core::store::{
    AssignResource, AuditInput, CampaignPatch, NewCampaign, NewResource, SettingsPatch,
    DB_KEY,
};
use sigcr_core::{Store, StoreError, Topic};

const DEMO_PASSWORD: &str = "Fortel2025!";

fn open_store() -> (Arc<MemoryStorage>, Arc<Store>) {
    let storage = Arc::new(MemoryStorage::new());
    let store = Store::open(Arc::clone(&storage) as Arc<dyn Storage>).unwrap();
    (storage, store)
}

fn new_resource(code: &str) -> NewResource {
    NewResource {
        kind: "PC".into(),
        code: code.into(),
        model: "X".into(),
        status: None,
        location: None,
        notes: None,
    }
}

#[test]
fn p1_reinit_does_not_reseed() {
    let (storage, store) = open_store();
    let (version, campaigns, kpi_records, audits, seeded_at) = {
        let db = store.db();
        (
            db.meta.version,
            db.campaigns.len(),
            db.kpi_records.len(),
            db.audit_logs.len(),
            db.meta.seeded_at,
        )
    };
    drop(store);

    let store2 = Store::open(storage as Arc<dyn Storage>).unwrap();
    let db = store2.db();
    assert_eq!(db.meta.version, version);
    assert_eq!(db.meta.seeded_at, seeded_at);
    assert_eq!(db.campaigns.len(), campaigns);
    assert_eq!(db.kpi_records.len(), kpi_records);
    // in particular, no second `seed` audit entry
    assert_eq!(db.audit_logs.len(), audits);
}

#[test]
fn corrupt_or_stale_blob_is_reseeded() {
    // unparsable blob
    let storage = Arc::new(MemoryStorage::new());
    storage.set(DB_KEY, "{not json").unwrap();
    let store = Store::open(Arc::clone(&storage) as Arc<dyn Storage>).unwrap();
    assert_eq!(store.db().campaigns.len(), 4);
    drop(store);

    // version mismatch
    let mut doc: serde_json::Value =
        serde_json::from_str(&storage.get(DB_KEY).unwrap().unwrap()).unwrap();
    doc["meta"]["version"] = serde_json::json!(99);
    storage.set(DB_KEY, &doc.to_string()).unwrap();
    let store = Store::open(storage as Arc<dyn Storage>).unwrap();
    let db = store.db();
    assert_eq!(db.meta.version, 1);
    assert_eq!(db.campaigns.len(), 4);
}

#[test]
fn p2_subscribers_observe_fully_applied_mutation() {
    let (_, store) = open_store();
    let observed = Arc::new(Mutex::new(None));

    let inner_store = Arc::clone(&store);
    let obs = Arc::clone(&observed);
    let sub = store.on(Topic::DbChanged, move |_| {
        let db = inner_store.db();
        *obs.lock() = Some((db.campaigns.len(), db.campaigns[0].name.clone()));
    });

    store
        .create_campaign(NewCampaign {
            name: "Retención Móvil".into(),
            client: "Telco Andina".into(),
            country: "Perú".into(),
            channels: vec!["Voz".into()],
            status: None,
            start_date: None,
            owner: None,
            targets: None,
            notes: None,
        })
        .unwrap();

    // the handler saw the campaign already inserted
    assert_eq!(
        observed.lock().clone(),
        Some((5, "Retención Móvil".to_string()))
    );
    sub.unsubscribe();
}

#[test]
fn transact_returns_mutator_value() {
    let (_, store) = open_store();
    let n = store.transact(|d| d.resources.len(), None).unwrap();
    assert_eq!(n, 42);
}

#[test]
fn p3_assignment_exclusivity_over_reassignments() {
    let (_, store) = open_store();
    store.login("admin@demo.com", DEMO_PASSWORD).unwrap();
    let r = store.create_resource(new_resource("PC-900")).unwrap();

    for agent in ["agt_1", "agt_2", "agt_3"] {
        store
            .assign_resource(AssignResource {
                resource_id: r.id.clone(),
                agent_id: agent.into(),
                campaign_id: "camp_pe_ventas".into(),
            })
            .unwrap();
        let db = store.db();
        let active = db
            .assignments
            .iter()
            .filter(|a| a.resource_id == r.id && a.active)
            .count();
        assert_eq!(active, 1);
    }

    store.unassign_resource(&r.id).unwrap();
    let db = store.db();
    let active = db
        .assignments
        .iter()
        .filter(|a| a.resource_id == r.id && a.active)
        .count();
    assert_eq!(active, 0);
    // history is preserved, only the active flag flips
    assert_eq!(
        db.assignments.iter().filter(|a| a.resource_id == r.id).count(),
        3
    );
}

#[test]
fn scenario_a_admin_login() {
    let (_, store) = open_store();
    let session = store.login("admin@demo.com", DEMO_PASSWORD).unwrap();
    assert_eq!(session.role, "Admin");
    assert_eq!(session.email, "admin@demo.com");

    let stored = store.session().unwrap();
    assert_eq!(stored.user_id, session.user_id);

    let db = store.db();
    assert_eq!(db.audit_logs[0].kind, "auth.login");
    assert_eq!(db.audit_logs[0].actor, "admin@demo.com");
}

#[test]
fn scenario_b_wrong_password_leaves_no_session() {
    let (_, store) = open_store();
    let err = store.login("admin@demo.com", "wrong").unwrap_err();
    assert!(matches!(err, StoreError::InvalidCredential));
    assert_eq!(err.to_string(), "Contraseña incorrecta.");
    assert!(store.session().is_none());

    let err = store.login("nadie@demo.com", DEMO_PASSWORD).unwrap_err();
    assert!(matches!(err, StoreError::UserNotFound));
    assert_eq!(err.to_string(), "Usuario no encontrado.");
}

#[test]
fn login_email_is_case_insensitive() {
    let (_, store) = open_store();
    let session = store.login("ADMIN@Demo.COM", DEMO_PASSWORD).unwrap();
    assert_eq!(session.role, "Admin");
}

#[test]
fn logout_audits_and_clears_session() {
    let (_, store) = open_store();
    store.login("supervisor@demo.com", DEMO_PASSWORD).unwrap();
    store.logout().unwrap();
    assert!(store.session().is_none());
    let db = store.db();
    assert_eq!(db.audit_logs[0].kind, "auth.logout");
    assert_eq!(db.audit_logs[0].actor, "supervisor@demo.com");
}

#[test]
fn scenario_c_resource_lifecycle() {
    let (_, store) = open_store();
    store.login("admin@demo.com", DEMO_PASSWORD).unwrap();

    let r = store.create_resource(new_resource("PC-099")).unwrap();
    assert_eq!(r.status, "Disponible");

    store
        .assign_resource(AssignResource {
            resource_id: r.id.clone(),
            agent_id: "agt_4".into(),
            campaign_id: "camp_cl_soporte".into(),
        })
        .unwrap();
    {
        let db = store.db();
        let res = db.resources.iter().find(|x| x.id == r.id).unwrap();
        assert_eq!(res.status, "Asignado");
        let actives: Vec<_> = db
            .assignments
            .iter()
            .filter(|a| a.resource_id == r.id && a.active)
            .collect();
        assert_eq!(actives.len(), 1);
        assert_eq!(actives[0].agent_id, "agt_4");
    }

    store.unassign_resource(&r.id).unwrap();
    let db = store.db();
    let res = db.resources.iter().find(|x| x.id == r.id).unwrap();
    assert_eq!(res.status, "Disponible");
    assert!(db
        .assignments
        .iter()
        .filter(|a| a.resource_id == r.id)
        .all(|a| !a.active));
}

#[test]
fn p6_role_gating() {
    let (_, store) = open_store();

    // no session: always false, even unrestricted
    assert!(!store.require_role(None));
    assert!(!store.require_role(Some(&["Admin"])));

    store.login("supervisor@demo.com", DEMO_PASSWORD).unwrap();
    assert!(store.require_role(None));
    assert!(store.require_role(Some(&["Admin", "Supervisor"])));
    assert!(!store.require_role(Some(&["Admin"])));

    store.login("admin@demo.com", DEMO_PASSWORD).unwrap();
    assert!(store.require_role(Some(&["Admin"])));
}

#[test]
fn scenario_e_reset_restores_fresh_seed() {
    let (_, store) = open_store();
    store.login("admin@demo.com", DEMO_PASSWORD).unwrap();
    for i in 0..50 {
        store
            .create_campaign(NewCampaign {
                name: format!("Campaña {i}"),
                client: "Cliente".into(),
                country: "Perú".into(),
                channels: vec![],
                status: None,
                start_date: None,
                owner: None,
                targets: None,
                notes: None,
            })
            .unwrap();
    }
    store
        .update_settings(SettingsPatch { theme: Some("light".into()), ..Default::default() })
        .unwrap();
    assert_eq!(store.db().campaigns.len(), 54);

    let events = Arc::new(Mutex::new(Vec::new()));
    let (e1, e2, e3) = (Arc::clone(&events), Arc::clone(&events), Arc::clone(&events));
    let _s1 = store.on(Topic::DbChanged, move |_| e1.lock().push("db"));
    let _s2 = store.on(Topic::SessionChanged, move |_| e2.lock().push("session"));
    let _s3 = store.on(Topic::SettingsChanged, move |_| e3.lock().push("settings"));

    store.reset_demo().unwrap();

    assert_eq!(store.db().campaigns.len(), 4);
    assert_eq!(store.db().audit_logs.len(), 1);
    assert!(store.session().is_none());
    assert_eq!(store.settings(), Settings::default());
    assert_eq!(*events.lock(), vec!["db", "session", "settings"]);
}

#[test]
fn settings_patch_merges_and_notifies() {
    let (_, store) = open_store();
    let seen = Arc::new(Mutex::new(None));
    let s = Arc::clone(&seen);
    let _sub = store.on(Topic::SettingsChanged, move |e| {
        if let sigcr_core::StoreEvent::SettingsChanged(next) = e {
            *s.lock() = Some(next.clone());
        }
    });

    store
        .update_settings(SettingsPatch { realtime: Some(false), ..Default::default() })
        .unwrap();
    let next = store.settings();
    assert!(!next.realtime);
    // untouched keys survive the patch
    assert_eq!(next.theme, "dark");
    assert!(!next.compact_sidebar);
    assert_eq!(seen.lock().clone(), Some(next));
}

#[test]
fn settings_survive_reopen() {
    let (storage, store) = open_store();
    store
        .update_settings(SettingsPatch {
            theme: Some("light".into()),
            compact_sidebar: Some(true),
            ..Default::default()
        })
        .unwrap();
    drop(store);

    let store = Store::open(storage as Arc<dyn Storage>).unwrap();
    let s = store.settings();
    assert_eq!(s.theme, "light");
    assert!(s.compact_sidebar);
    assert!(s.realtime);
}

#[test]
fn validation_errors_use_ui_messages() {
    let (_, store) = open_store();

    let err = store
        .create_campaign(NewCampaign {
            name: "  ".into(),
            client: "Cliente".into(),
            country: "Perú".into(),
            channels: vec![],
            status: None,
            start_date: None,
            owner: None,
            targets: None,
            notes: None,
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "Completa nombre y cliente.");

    let err = store
        .create_resource(NewResource {
            kind: "PC".into(),
            code: "".into(),
            model: "X".into(),
            status: None,
            location: None,
            notes: None,
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "Completa código y modelo.");
}

#[test]
fn kpi_def_code_is_uppercased() {
    let (_, store) = open_store();
    let def = store
        .create_kpi_def(sigcr_core::store::NewKpiDef {
            code: "  asa ".into(),
            name: "Average Speed of Answer".into(),
            frequency: None,
            owner: None,
            formula: None,
            description: None,
        })
        .unwrap();
    assert_eq!(def.code, "ASA");
    assert_eq!(def.frequency, "Diaria");
    assert_eq!(store.db().kpi_catalog[0].code, "ASA");
}

#[test]
fn update_campaign_patches_in_place() {
    let (_, store) = open_store();
    store
        .update_campaign(
            "camp_pe_ventas",
            CampaignPatch { status: Some("Pausada".into()), ..Default::default() },
        )
        .unwrap();
    let db = store.db();
    let c = db.campaigns.iter().find(|c| c.id == "camp_pe_ventas").unwrap();
    assert_eq!(c.status, "Pausada");
    // everything else untouched
    assert_eq!(c.client, "Telco Andina");
    assert_eq!(db.audit_logs[0].kind, "campaign.update");
}

#[test]
fn audit_log_is_capped_at_400() {
    let (_, store) = open_store();
    for i in 0..405 {
        store
            .add_audit(AuditInput::info("event", format!("evento {i}")))
            .unwrap();
    }
    let db = store.db();
    assert_eq!(db.audit_logs.len(), 400);
    // newest first
    assert_eq!(db.audit_logs[0].message, "evento 404");
}

#[test]
fn audit_actor_defaults_to_sistema_without_session() {
    let (_, store) = open_store();
    store.add_audit(AuditInput::info("event", "sin sesión")).unwrap();
    assert_eq!(store.db().audit_logs[0].actor, "sistema");
}

#[test]
fn notifications_prepend_cap_and_mark_read() {
    let (_, store) = open_store();
    for i in 0..85 {
        store
            .add_notification(sigcr_core::store::NotificationInput {
                kind: "info".into(),
                title: format!("n{i}"),
                message: String::new(),
                meta: serde_json::json!({}),
            })
            .unwrap();
    }
    {
        let db = store.db();
        assert_eq!(db.notifications.len(), 80);
        assert_eq!(db.notifications[0].title, "n84");
        assert!(db.notifications.iter().any(|n| !n.read));
    }

    store.mark_notifications_read().unwrap();
    let db = store.db();
    assert!(db.notifications.iter().all(|n| n.read));
    assert_eq!(db.audit_logs[0].kind, "notify.readAll");
}

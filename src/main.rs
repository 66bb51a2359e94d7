// src/main.rs
//
// Headless demo driver: opens the store from a local data directory, signs
// in as the demo admin, wires the reactivity loops and prints a KPI snapshot
// while the simulator feeds the document.

use std::env;
use std::sync::Arc;

use sigcr_core::router::{route_table, Page, PageContext, RoutePages, Router, Shell};
use sigcr_core::simulator::latest_kpi;
use sigcr_core::storage::FileStorage;
use sigcr_core::{Simulator, Store, Topic};

/// Plain text page used for every slot of the demo route table.
struct TextPage {
    title: &'static str,
}

impl Page for TextPage {
    fn title(&self) -> &str {
        self.title
    }

    fn render(&self, ctx: &PageContext) -> String {
        format!("<h1>{}</h1><p>{}</p>", self.title, ctx.path)
    }
}

fn page(title: &'static str) -> Arc<dyn Page> {
    Arc::new(TextPage { title })
}

/// Chrome/view host that just traces what the router asks for.
struct LogShell;

impl Shell for LogShell {
    fn render_sidebar(&self) {
        tracing::trace!("render sidebar");
    }
    fn render_topbar(&self) {
        tracing::trace!("render topbar");
    }
    fn clear_chrome(&self) {
        tracing::trace!("clear chrome");
    }
    fn set_view(&self, html: &str) {
        tracing::debug!(bytes = html.len(), "view swapped");
    }
    fn set_title(&self, title: &str) {
        tracing::debug!(%title, "page title");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let data_dir = env::var("SIGCR_DATA_DIR").unwrap_or_else(|_| "./sigcr-data".into());
    let storage = Arc::new(FileStorage::open(&data_dir)?);
    let store = Store::open(storage)?;
    println!("✅ SIGCR_DATA_DIR={data_dir}");

    let simulator = Simulator::new(Arc::clone(&store));

    let router = Arc::new(Router::new(
        Arc::clone(&store),
        Arc::new(LogShell),
        route_table(RoutePages {
            login: page("Iniciar sesión"),
            dashboard: page("Dashboard"),
            campaigns: page("Campañas"),
            resources: page("Recursos"),
            integrations: page("Integraciones"),
            data_hub: page("Data Hub"),
            quality: page("Calidad"),
            incidents: page("Incidentes"),
            reports: page("Reportes"),
            security: page("Seguridad"),
            architecture: page("Arquitectura"),
        }),
    ));

    // Reactivity: settings/session changes re-sync the simulator; session
    // changes also re-run the router.
    let sim = Arc::clone(&simulator);
    let _settings_sub = store.on(Topic::SettingsChanged, move |_| sim.sync());
    let sim = Arc::clone(&simulator);
    let nav = Arc::clone(&router);
    let _session_sub = store.on(Topic::SessionChanged, move |_| {
        sim.sync();
        nav.route();
    });

    simulator.sync();
    router.start();

    let session = store.login("admin@demo.com", "Fortel2025!")?;
    println!("🚀 Sesión demo: {} ({})", session.email, session.role);

    let mut snapshot = tokio::time::interval(std::time::Duration::from_secs(15));
    snapshot.tick().await; // first tick completes immediately
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = snapshot.tick() => {
                let db = store.db();
                for c in db.campaigns.iter().filter(|c| c.status == "Activa") {
                    if let Some(r) = latest_kpi(&db, &c.id) {
                        println!(
                            "📈 {:<20} SLA {:>3.0}%  CSAT {:>2}  TMO {:>3}s  contactos {:>4}",
                            c.name,
                            r.sla * 100.0,
                            r.csat,
                            r.aht,
                            r.contacts,
                        );
                    }
                }
            }
        }
    }

    simulator.stop();
    store.logout()?;
    println!("👋 Sesión cerrada");
    Ok(())
}

// src/router/mod.rs
//
// Fragment router: parses `#/path?key=value` hashes, enforces auth and role
// guards, and swaps the mounted page. Error-like conditions resolve by
// redirecting to a safe default; a page that panics in `render`/`mount` is
// deliberately not caught and crashes the navigation visibly.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub path: String,
    pub query: BTreeMap<String, String>,
}

pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Page contract. `render` is pure markup generation; `mount` wires
/// listeners and returns the cleanup that must undo them — a page that
/// subscribes to store events and does not unsubscribe in its cleanup leaks
/// the handler across navigations.
pub trait Page: Send + Sync {
    fn title(&self) -> &str;
    fn render(&self, ctx: &PageContext) -> String;
    fn mount(&self, _ctx: &PageContext) -> Option<Cleanup> {
        None
    }
}

/// Chrome and view host, the UI boundary. Implementations render the
/// sidebar/topbar and own the view container; the router only sequences the
/// calls.
pub trait Shell: Send + Sync {
    fn render_sidebar(&self);
    fn render_topbar(&self);
    fn clear_chrome(&self);
    fn set_view(&self, html: &str);
    fn set_title(&self, title: &str);
}

pub struct Route {
    pub path: &'static str,
    pub page: Arc<dyn Page>,
    pub auth: bool,
    pub roles: Option<&'static [&'static str]>,
}

/// All page slots of the route table; pages themselves live outside this
/// crate.
pub struct RoutePages {
    pub login: Arc<dyn Page>,
    pub dashboard: Arc<dyn Page>,
    pub campaigns: Arc<dyn Page>,
    pub resources: Arc<dyn Page>,
    pub integrations: Arc<dyn Page>,
    pub data_hub: Arc<dyn Page>,
    pub quality: Arc<dyn Page>,
    pub incidents: Arc<dyn Page>,
    pub reports: Arc<dyn Page>,
    pub security: Arc<dyn Page>,
    pub architecture: Arc<dyn Page>,
}

/// The static route table: exact-path lookup, unmatched paths fall back to
/// the dashboard entry.
pub fn route_table(pages: RoutePages) -> Vec<Route> {
    vec![
        Route { path: "/login", page: pages.login, auth: false, roles: None },
        Route { path: "/dashboard", page: pages.dashboard, auth: true, roles: None },
        Route { path: "/campaigns", page: pages.campaigns, auth: true, roles: None },
        Route {
            path: "/resources",
            page: pages.resources,
            auth: true,
            roles: Some(&["Admin", "Supervisor"]),
        },
        Route {
            path: "/integrations",
            page: pages.integrations,
            auth: true,
            roles: Some(&["Admin", "Supervisor", "Analista"]),
        },
        Route {
            path: "/data-hub",
            page: pages.data_hub,
            auth: true,
            roles: Some(&["Admin", "Analista"]),
        },
        Route {
            path: "/quality",
            page: pages.quality,
            auth: true,
            roles: Some(&["Admin", "Supervisor"]),
        },
        Route {
            path: "/incidents",
            page: pages.incidents,
            auth: true,
            roles: Some(&["Admin", "Supervisor"]),
        },
        Route {
            path: "/reports",
            page: pages.reports,
            auth: true,
            roles: Some(&["Admin", "Supervisor", "Analista"]),
        },
        Route { path: "/security", page: pages.security, auth: true, roles: Some(&["Admin"]) },
        Route { path: "/architecture", page: pages.architecture, auth: true, roles: None },
    ]
}

pub struct Router {
    store: Arc<Store>,
    shell: Arc<dyn Shell>,
    routes: Vec<Route>,
    hash: Mutex<String>,
    cleanup: Mutex<Option<Cleanup>>,
}

impl Router {
    pub fn new(store: Arc<Store>, shell: Arc<dyn Shell>, routes: Vec<Route>) -> Self {
        Self {
            store,
            shell,
            routes,
            hash: Mutex::new(String::new()),
            cleanup: Mutex::new(None),
        }
    }

    /// Initial navigation against the current hash. The host is expected to
    /// feed subsequent hash changes through [`Router::navigate`].
    pub fn start(&self) {
        self.route();
    }

    pub fn navigate(&self, hash: &str) {
        *self.hash.lock() = hash.to_string();
        self.route();
    }

    pub fn current_hash(&self) -> String {
        self.hash.lock().clone()
    }

    /// Re-run the navigation logic against the current hash. Redirects
    /// rewrite the hash and re-enter; each hop lands on a safe default, so
    /// the recursion converges within two steps.
    pub fn route(&self) {
        let session = self.store.session();
        let hash = self.hash.lock().clone();
        let (path, query) = parse_hash(&hash);

        if session.is_none() && path != "/login" {
            return self.redirect("#/login");
        }
        if session.is_some() && (path == "/" || path == "/login") {
            return self.redirect("#/dashboard");
        }

        let Some(def) = self
            .routes
            .iter()
            .find(|r| r.path == path)
            .or_else(|| self.routes.iter().find(|r| r.path == "/dashboard"))
        else {
            return;
        };

        if def.auth && session.is_none() {
            return self.redirect("#/login");
        }
        if let Some(roles) = def.roles {
            if !self.store.require_role(Some(roles)) {
                // silent downgrade, not an error page
                return self.redirect("#/dashboard");
            }
        }

        if session.is_some() {
            self.shell.render_sidebar();
            self.shell.render_topbar();
        } else {
            self.shell.clear_chrome();
        }

        let prev_cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = prev_cleanup {
            cleanup();
        }

        let ctx = PageContext { path: path.clone(), query };
        tracing::debug!(path = %ctx.path, "mounting page");
        self.shell
            .set_view(&format!("<div class=\"page\">{}</div>", def.page.render(&ctx)));
        self.shell.set_title(def.page.title());

        *self.cleanup.lock() = def.page.mount(&ctx);

        // once more after mount, for active-link highlighting
        if session.is_some() {
            self.shell.render_sidebar();
        }
    }

    fn redirect(&self, hash: &str) {
        *self.hash.lock() = hash.to_string();
        self.route();
    }
}

/// Strip a leading `#`, default non-absolute paths to `/dashboard`, split
/// off the query string and decode it as `&`-separated `key=value` pairs.
pub fn parse_hash(hash: &str) -> (String, BTreeMap<String, String>) {
    let h = hash.strip_prefix('#').unwrap_or(hash);
    let full = if h.starts_with('/') { h } else { "/dashboard" };

    let (path, query_str) = match full.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (full, None),
    };

    let mut query = BTreeMap::new();
    if let Some(qs) = query_str {
        for pair in qs.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            query.insert(percent_decode(k), percent_decode(v));
        }
    }
    (path.to_string(), query)
}

/// Minimal percent-decoding for query components; `+` is left as-is, and
/// malformed escapes pass through unchanged.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

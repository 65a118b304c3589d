//! HTTP API application wiring (Axum router + state).
//!
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `cookies.rs`: cookie names and deployment-dependent attributes
//! - `errors.rs`: consistent error responses

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{Router, middleware::from_fn_with_state, routing::get};
use chrono::Utc;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::Key};

use warden_auth::{CsrfRegistry, IdentityProviderClient, TokenIssuer, UserDirectory, select_identity_provider};
use warden_infra::{BlogPost, InMemoryContentStore, Invoice, Project};
use warden_core::{DomainError, UserId};

use crate::config::AppConfig;
use crate::middleware::{self, Authenticator, PublicPaths, session};

pub mod cookies;
pub mod errors;
pub mod routes;

use cookies::{CookiePolicy, SESSION_COOKIE};

/// Sample content served behind the gate.
#[derive(Debug, Default)]
pub struct ContentStores {
    pub projects: InMemoryContentStore<Project>,
    pub invoices: InMemoryContentStore<Invoice>,
    pub blog_posts: InMemoryContentStore<BlogPost>,
}

impl ContentStores {
    pub fn with_samples() -> Result<Self, DomainError> {
        let projects = [(
            1,
            Project {
                id: 1,
                name: "Website relaunch".to_string(),
                owner_id: UserId::new(1)?,
                updated_at: Utc::now(),
            },
        )];

        Ok(Self {
            projects: InMemoryContentStore::with_items(projects),
            invoices: InMemoryContentStore::with_items([(
                1,
                Invoice {
                    id: 1,
                    number: "INV-0001".to_string(),
                    amount_cents: 125_000,
                    project_id: 1,
                },
            )]),
            blog_posts: InMemoryContentStore::with_items([
                (
                    1,
                    BlogPost {
                        id: 1,
                        title: "Hello".to_string(),
                        body: "First post.".to_string(),
                    },
                ),
                (
                    2,
                    BlogPost {
                        id: 2,
                        title: "Release notes".to_string(),
                        body: "What changed.".to_string(),
                    },
                ),
            ]),
        })
    }
}

/// Shared, cheaply clonable request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn UserDirectory>,
    pub tokens: Arc<TokenIssuer>,
    pub csrf: Arc<CsrfRegistry>,
    pub federation: Option<Arc<dyn IdentityProviderClient>>,
    pub cookies: CookiePolicy,
    pub authenticator: Arc<Authenticator>,
    pub public_paths: Arc<PublicPaths>,
    pub content: Arc<ContentStores>,
    session_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, directory: Arc<dyn UserDirectory>) -> anyhow::Result<Self> {
        let federation = select_identity_provider(config.identity_provider.as_ref(), config.mode)?;
        let session_key = session::session_key(&config.session_secret)?;

        Ok(Self {
            tokens: Arc::new(config.token_issuer()),
            csrf: Arc::new(CsrfRegistry::new(config.csrf_retention)),
            cookies: CookiePolicy::for_deployment(config.mode, config.cross_domain),
            federation,
            directory,
            authenticator: Arc::new(Authenticator::default()),
            public_paths: Arc::new(PublicPaths::default()),
            content: Arc::new(ContentStores::with_samples()?),
            session_key,
            config: Arc::new(config),
        })
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(config: AppConfig, directory: Arc<dyn UserDirectory>) -> anyhow::Result<Router> {
    Ok(router(AppState::new(config, directory)?))
}

/// Wire routes and the request pipeline around `state`.
///
/// Layer order (outermost first): session → authenticate → csrf → routes/gate.
pub fn router(state: AppState) -> Router {
    let session_ttl = time::Duration::seconds(state.config.refresh_ttl.num_seconds());
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_http_only(true)
        .with_secure(state.cookies.secure())
        .with_same_site(state.cookies.session_same_site())
        .with_path("/")
        .with_expiry(Expiry::OnInactivity(session_ttl))
        .with_signed(state.session_key.clone());

    Router::new()
        .route("/", get(routes::system::index))
        .nest("/api", routes::router(&state))
        .layer(from_fn_with_state(state.clone(), middleware::csrf_guard))
        .layer(from_fn_with_state(state.clone(), middleware::authenticate))
        .layer(sessions)
        .with_state(state)
}

/// Periodically drop stale entries from the CSRF registry.
pub fn spawn_csrf_sweeper(registry: Arc<CsrfRegistry>, every: StdDuration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = registry.sweep(Utc::now());
            tracing::debug!(removed, remaining = registry.len(), "csrf registry sweep");
        }
    })
}

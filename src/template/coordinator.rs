//! Decides whether a message renders its template, a downloading body or an
//! error body, and drives template downloads within the retry budget.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::delegate::TemplateDelegate;
use crate::error::ParseError;
use crate::executor::{complete_on, CompletionExecutor};
use crate::parser::{self, Body, Template};
use crate::theme::Theme;

use super::binder::{bind, resolve_color_variables, Appearance, BindError};
use super::cache::{StoredTemplate, TemplateCache, TemplateKind};
use super::fallback::{downloading_body, themed_error_body};
use super::payload::TemplatePayload;
use super::retry::RetryTracker;
use super::source::{parse_template_json, FetchError, RemoteTemplateSource, TemplateListPage};

/// Most pages one template list sync follows
pub const MAX_LIST_PAGES: usize = 100;

/// Why a template could not be rendered
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TemplateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("template `{key}` is unavailable")]
    Missing { key: String },
}

/// Rendering inputs for fallback bodies
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub theme: &'a Theme,
    pub appearance: Appearance,
    pub downloading_height: f64,
}

/// A bound and parsed template ready for layout
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    pub template: Template,
    /// Bound data template, handed to actions untouched
    pub data_template: String,
}

/// Outcome of resolving a message's template
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Ready(ResolvedTemplate),
    /// The template is on its way. `needs_fetch` is set when no download is
    /// running yet and the caller should start one.
    Downloading { body: Body, needs_fetch: bool },
    /// Retries are exhausted or the template can never render
    Failed { body: Body, error: TemplateError },
}

impl Resolution {
    /// The fallback body to render instead of a template, if any
    pub fn fallback_body(&self) -> Option<&Body> {
        match self {
            Resolution::Ready(_) => None,
            Resolution::Downloading { body, .. } | Resolution::Failed { body, .. } => Some(body),
        }
    }
}

/// Owns the template cache and gates downloads by the retry budget
pub struct TemplateCoordinator {
    cache: Mutex<TemplateCache>,
    retries: Arc<RetryTracker>,
    source: Arc<dyn RemoteTemplateSource>,
    in_flight: Mutex<HashSet<(TemplateKind, String)>>,
}

impl TemplateCoordinator {
    pub fn new(source: Arc<dyn RemoteTemplateSource>, retries: Arc<RetryTracker>) -> Self {
        Self::with_cache(source, retries, TemplateCache::new())
    }

    /// Start from a cache restored by the host
    pub fn with_cache(
        source: Arc<dyn RemoteTemplateSource>,
        retries: Arc<RetryTracker>,
        cache: TemplateCache,
    ) -> Self {
        Self {
            cache: Mutex::new(cache),
            retries,
            source,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> MutexGuard<'_, TemplateCache> {
        self.cache.lock()
    }

    pub fn retries(&self) -> &Arc<RetryTracker> {
        &self.retries
    }

    pub fn get_template(&self, kind: TemplateKind, key: &str) -> Option<StoredTemplate> {
        self.cache.lock().get(kind, key).cloned()
    }

    pub fn is_downloading(&self, kind: TemplateKind, key: &str) -> bool {
        self.in_flight.lock().contains(&(kind, key.to_string()))
    }

    /// Bind and parse the cached template for `payload`, or pick the
    /// fallback body to show instead.
    pub fn resolve(
        &self,
        kind: TemplateKind,
        payload: &TemplatePayload,
        ctx: ResolveContext<'_>,
    ) -> Resolution {
        let Some(stored) = self.get_template(kind, &payload.key) else {
            return self.not_ready(kind, &payload.key, ctx, TemplateError::Missing {
                key: payload.key.clone(),
            });
        };

        let colors = match resolve_color_variables(&stored.color_variables, ctx.theme.mode) {
            Ok(colors) => colors,
            Err(e) => {
                tracing::warn!(key = %payload.key, error = %e, "color variables rejected");
                return self.failed(ctx, e.into());
            }
        };

        let bound = bind(
            &stored.ui_template,
            &stored.data_template,
            &payload.variables,
            colors.for_appearance(ctx.appearance),
        );

        match parser::parse_str(&bound.ui_template).and_then(Template::ensure_supported) {
            Ok(template) => Resolution::Ready(ResolvedTemplate {
                template,
                data_template: bound.data_template,
            }),
            Err(e) => {
                let count = self.retries.increase_retry_count(&payload.key);
                tracing::warn!(key = %payload.key, attempt = count, error = %e, "cached template failed to parse");
                self.cache.lock().remove(kind, &payload.key);
                self.not_ready(kind, &payload.key, ctx, e.into())
            }
        }
    }

    fn not_ready(
        &self,
        kind: TemplateKind,
        key: &str,
        ctx: ResolveContext<'_>,
        error: TemplateError,
    ) -> Resolution {
        if self.retries.is_retry_available(key) {
            Resolution::Downloading {
                body: downloading_body(ctx.downloading_height, ctx.theme, ctx.appearance),
                needs_fetch: !self.is_downloading(kind, key),
            }
        } else {
            self.failed(ctx, error)
        }
    }

    fn failed(&self, ctx: ResolveContext<'_>, error: TemplateError) -> Resolution {
        Resolution::Failed {
            body: themed_error_body(ctx.theme, ctx.appearance),
            error,
        }
    }

    /// Download one template. Every failure costs one retry.
    ///
    /// The cache is left untouched; the caller applies the result on the
    /// thread that owns the layout state.
    pub async fn load_template(
        &self,
        kind: TemplateKind,
        key: &str,
    ) -> Result<StoredTemplate, FetchError> {
        if !self.retries.is_retry_available(key) {
            return Err(FetchError::RetryExhausted(key.to_string()));
        }

        let result = match self.source.load_template(kind, key).await {
            Ok(json) => parse_template_json(&json),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            let count = self.retries.increase_retry_count(key);
            tracing::warn!(key, kind = kind.as_str(), attempt = count, error = %e, "template download failed");
        } else {
            tracing::debug!(key, kind = kind.as_str(), "template downloaded");
        }
        result
    }

    /// Start a background download; the cache update and the reload signal
    /// are delivered through `executor`.
    ///
    /// Returns `None` when a download for the key is already running or the
    /// retry budget is spent.
    pub fn request_template(
        self: &Arc<Self>,
        kind: TemplateKind,
        key: &str,
        runtime: &Handle,
        executor: Arc<dyn CompletionExecutor>,
        delegate: Arc<dyn TemplateDelegate>,
    ) -> Option<JoinHandle<()>> {
        if !self.retries.is_retry_available(key) {
            tracing::debug!(key, "retry budget spent, not requesting");
            return None;
        }
        if !self.in_flight.lock().insert((kind, key.to_string())) {
            return None;
        }

        let this = Arc::clone(self);
        let key = key.to_string();
        Some(runtime.spawn(async move {
            let result = this.load_template(kind, &key).await;
            complete_on(executor.as_ref(), move || {
                if let Ok(template) = result {
                    this.cache.lock().insert(kind, template);
                }
                this.in_flight.lock().remove(&(kind, key));
                delegate.need_reload_cell();
            });
        }))
    }

    /// Fetch every page changed since the cached token
    ///
    /// A page that promises more entries must move the token forward, and a
    /// sync stops with [`FetchError::Malformed`] after [`MAX_LIST_PAGES`] pages.
    pub async fn fetch_template_list(
        &self,
        kind: TemplateKind,
        since: Option<String>,
    ) -> Result<TemplateListPage, FetchError> {
        let mut merged = TemplateListPage {
            token: since,
            ..Default::default()
        };
        let mut pages = 0;
        loop {
            let json = self
                .source
                .load_template_list(kind, merged.token.as_deref())
                .await?;
            let page = TemplateListPage::from_json(&json)?;
            pages += 1;
            merged.templates.extend(page.templates);
            if !page.has_more {
                if page.token.is_some() {
                    merged.token = page.token;
                }
                break;
            }
            if page.token.is_none() || page.token == merged.token {
                return Err(FetchError::Malformed(
                    "template list page has more entries but no new token".to_string(),
                ));
            }
            if pages >= MAX_LIST_PAGES {
                return Err(FetchError::Malformed(format!(
                    "template list did not end within {MAX_LIST_PAGES} pages"
                )));
            }
            merged.token = page.token;
        }
        tracing::debug!(kind = kind.as_str(), count = merged.templates.len(), "template list fetched");
        Ok(merged)
    }

    /// Store a fetched list and its token; returns how many templates changed
    pub fn apply_template_list(&self, kind: TemplateKind, page: TemplateListPage) -> usize {
        let mut cache = self.cache.lock();
        let count = page.templates.len();
        for template in page.templates {
            cache.insert(kind, template);
        }
        if let Some(token) = page.token {
            cache.set_token(kind, token);
        }
        count
    }

    /// Sync the template list when the server reports a newer token
    ///
    /// Returns `None` when the cache is already current.
    pub fn request_template_list(
        self: &Arc<Self>,
        kind: TemplateKind,
        server_token: &str,
        runtime: &Handle,
        executor: Arc<dyn CompletionExecutor>,
        delegate: Arc<dyn TemplateDelegate>,
    ) -> Option<JoinHandle<()>> {
        let since = {
            let cache = self.cache.lock();
            if !cache.needs_sync(kind, server_token) {
                return None;
            }
            cache.token(kind).map(str::to_string)
        };

        let this = Arc::clone(self);
        Some(runtime.spawn(async move {
            match this.fetch_template_list(kind, since).await {
                Ok(page) => complete_on(executor.as_ref(), move || {
                    if this.apply_template_list(kind, page) > 0 {
                        delegate.need_reload_cell();
                    }
                }),
                Err(e) => {
                    tracing::warn!(kind = kind.as_str(), error = %e, "template list sync failed");
                }
            }
        }))
    }
}

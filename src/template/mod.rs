//! Template sourcing: binding, caching, downloading and fallbacks
//!
//! A message names a template by key. The [`TemplateCoordinator`] looks the
//! key up in its [`TemplateCache`], binds the message's variables into the
//! stored source, and parses the result. While the source is missing it
//! hands out a downloading body; once the [`RetryTracker`] budget for the key
//! is spent it hands out an error body instead.

pub mod binder;
pub mod cache;
pub mod coordinator;
pub mod fallback;
pub mod payload;
pub mod retry;
pub mod source;

pub use binder::{bind, resolve_color_variables, Appearance, BindError, BindResult, ColorVariables, ThemeMode};
pub use cache::{StoredTemplate, TemplateCache, TemplateKind};
pub use coordinator::{Resolution, ResolveContext, ResolvedTemplate, TemplateCoordinator, TemplateError, MAX_LIST_PAGES};
pub use fallback::{downloading_body, error_body, themed_error_body, SPINNER_IMAGE_URL};
pub use payload::TemplatePayload;
pub use retry::{RetryTracker, MAX_RETRY_COUNT};
pub use source::{FetchError, MemoryTemplateSource, RemoteTemplateSource, TemplateListPage};

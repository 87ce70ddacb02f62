//! Isolated script realms hosting composed documents.
//!
//! Every [`Sandbox::load`] tears the previous realm down and builds a fresh boa
//! [`Context`], so no globals survive a reload. Console calls inside a realm are
//! routed to a [`ConsoleSink`] capability that is injected when the realm is
//! created and can be swapped for a bounded scope with [`Sandbox::install_sink`].
//!
//! Native functions must be `Copy` closures, so they only capture the realm id.
//! The id is resolved against a thread-local sink table at call time; boa
//! contexts are `!Send`, so a realm never leaves the thread that built it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{
    Context, JsError, JsResult, JsString, JsValue, NativeFunction, Source, js_string,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::markup;
use crate::domain::errors::SandboxError;
use crate::domain::model::ComposedDocument;

static NEXT_REALM_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SINKS: RefCell<HashMap<RealmId, Rc<dyn ConsoleSink>>> = RefCell::new(HashMap::new());
}

/// Identity of one realm instance. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RealmId(u64);

impl RealmId {
    fn next() -> Self {
        Self(NEXT_REALM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "realm-{}", self.0)
    }
}

/// Output channel of a console call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleChannel {
    /// `console.log`, `console.info`, `console.debug`.
    Log,
    /// `console.error`, `console.warn`.
    Error,
}

impl ConsoleChannel {
    pub fn is_error(&self) -> bool {
        matches!(self, ConsoleChannel::Error)
    }
}

/// Destination for console output of a realm.
pub trait ConsoleSink {
    fn emit(&self, channel: ConsoleChannel, text: &str);
}

/// Default sink: forwards console lines to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ConsoleSink for TracingSink {
    fn emit(&self, channel: ConsoleChannel, text: &str) {
        match channel {
            ConsoleChannel::Log => info!(target: "webweaver::console", "{text}"),
            ConsoleChannel::Error => warn!(target: "webweaver::console", "{text}"),
        }
    }
}

/// Runaway-script guards applied to each realm. Zero keeps the engine default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SandboxLimits {
    #[serde(default)]
    pub loop_iteration_limit: u64,
    #[serde(default)]
    pub recursion_limit: usize,
}

/// Observable sandbox state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Unloaded,
    Loaded { faulted_last_run: bool },
}

/// A single isolated execution context.
pub struct Realm {
    id: RealmId,
    context: Context,
}

impl Realm {
    /// Build a realm with its globals installed. On failure the partially
    /// built realm is dropped, releasing its sink registration.
    fn create(
        document: &ComposedDocument,
        limits: SandboxLimits,
        sink: Rc<dyn ConsoleSink>,
    ) -> Result<Self, SandboxError> {
        let id = RealmId::next();
        let mut context = Context::default();

        if limits.loop_iteration_limit > 0 {
            context
                .runtime_limits_mut()
                .set_loop_iteration_limit(limits.loop_iteration_limit);
        }
        if limits.recursion_limit > 0 {
            context
                .runtime_limits_mut()
                .set_recursion_limit(limits.recursion_limit);
        }

        SINKS.with(|sinks| sinks.borrow_mut().insert(id, sink));
        let mut realm = Self { id, context };

        install_globals(&mut realm.context, id, document).map_err(|err| {
            SandboxError::execution(thrown_message(&err, &mut realm.context))
        })?;

        debug!(realm = %id, "created realm");
        Ok(realm)
    }

    pub fn id(&self) -> RealmId {
        self.id
    }

    /// Evaluate a script against this realm's globals, then drain promise jobs.
    fn eval(&mut self, source: &str) -> Result<(), SandboxError> {
        let result = self.context.eval(Source::from_bytes(source.as_bytes()));
        self.context.run_jobs();
        result
            .map(|_| ())
            .map_err(|err| SandboxError::execution(thrown_message(&err, &mut self.context)))
    }

    fn report(&self, channel: ConsoleChannel, text: &str) {
        dispatch(self.id, channel, text);
    }
}

impl Drop for Realm {
    fn drop(&mut self) {
        let _ = SINKS.try_with(|sinks| sinks.borrow_mut().remove(&self.id));
        debug!(realm = %self.id, "tore down realm");
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Restores a realm's previous console sink when dropped.
#[must_use = "the previous sink is restored as soon as the guard is dropped"]
pub struct SinkGuard {
    realm: RealmId,
    previous: Option<Rc<dyn ConsoleSink>>,
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        let _ = SINKS.try_with(|sinks| {
            let mut sinks = sinks.borrow_mut();
            // A realm torn down while the guard was held stays gone.
            if let Some(slot) = sinks.get_mut(&self.realm) {
                *slot = previous;
            }
        });
    }
}

/// Hosts at most one realm and re-executes scripts against it on demand.
pub struct Sandbox {
    realm: Option<Realm>,
    limits: SandboxLimits,
    default_sink: Rc<dyn ConsoleSink>,
    faulted_last_run: bool,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(SandboxLimits::default())
    }
}

impl Sandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self::with_sink(limits, Rc::new(TracingSink))
    }

    /// Create a sandbox whose realms start out logging to `sink`.
    pub fn with_sink(limits: SandboxLimits, sink: Rc<dyn ConsoleSink>) -> Self {
        Self {
            realm: None,
            limits,
            default_sink: sink,
            faulted_last_run: false,
        }
    }

    pub fn state(&self) -> SandboxState {
        match self.realm {
            None => SandboxState::Unloaded,
            Some(_) => SandboxState::Loaded {
                faulted_last_run: self.faulted_last_run,
            },
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.realm.is_some()
    }

    pub fn realm_id(&self) -> Option<RealmId> {
        self.realm.as_ref().map(Realm::id)
    }

    /// Replace the realm with a fresh one hosting `document`.
    ///
    /// Every script element runs once, in document order. A script that throws
    /// does not stop later ones; its message is reported on the realm's error
    /// channel prefixed with `Uncaught`. If the realm cannot be built the
    /// sandbox stays unloaded.
    pub fn load(&mut self, document: &ComposedDocument) {
        self.realm = None;
        self.faulted_last_run = false;

        let mut realm =
            match Realm::create(document, self.limits, Rc::clone(&self.default_sink)) {
                Ok(realm) => realm,
                Err(err) => {
                    warn!(error = %err, "failed to create realm");
                    return;
                }
            };
        for script in markup::scripts(document.as_str()) {
            if let Err(err) = realm.eval(&script) {
                warn!(realm = %realm.id(), error = %err, "uncaught error while loading document");
                realm.report(ConsoleChannel::Error, &format!("Uncaught {err}"));
            }
        }
        self.realm = Some(realm);
    }

    /// Execute `javascript` against the globals of the loaded realm.
    pub fn run(&mut self, javascript: &str) -> Result<(), SandboxError> {
        let realm = self.realm.as_mut().ok_or(SandboxError::Unavailable)?;
        let outcome = realm.eval(javascript);
        if let Err(err) = &outcome {
            debug!(realm = %realm.id(), error = %err, "run failed");
        }
        self.faulted_last_run = outcome.is_err();
        outcome
    }

    /// Console sink currently attached to the loaded realm.
    pub fn sink(&self) -> Option<Rc<dyn ConsoleSink>> {
        let id = self.realm_id()?;
        SINKS.with(|sinks| sinks.borrow().get(&id).cloned())
    }

    /// Attach `sink` to the loaded realm until the returned guard is dropped.
    pub fn install_sink(
        &mut self,
        sink: Rc<dyn ConsoleSink>,
    ) -> Result<SinkGuard, SandboxError> {
        let id = self.realm_id().ok_or(SandboxError::Unavailable)?;
        let previous = SINKS.with(|sinks| sinks.borrow_mut().insert(id, sink));
        match previous {
            Some(previous) => Ok(SinkGuard {
                realm: id,
                previous: Some(previous),
            }),
            None => {
                SINKS.with(|sinks| sinks.borrow_mut().remove(&id));
                Err(SandboxError::Unavailable)
            }
        }
    }
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("realm", &self.realm)
            .field("limits", &self.limits)
            .field("faulted_last_run", &self.faulted_last_run)
            .finish_non_exhaustive()
    }
}

fn dispatch(realm: RealmId, channel: ConsoleChannel, text: &str) {
    // Clone out of the table first so a sink may itself touch the table.
    let sink = SINKS.with(|sinks| sinks.borrow().get(&realm).cloned());
    match sink {
        Some(sink) => sink.emit(channel, text),
        None => debug!(realm = %realm, "console output from a torn down realm dropped"),
    }
}

fn install_globals(
    context: &mut Context,
    id: RealmId,
    document: &ComposedDocument,
) -> JsResult<()> {
    let console = ObjectInitializer::new(context)
        .function(console_method(id, ConsoleChannel::Log), js_string!("log"), 0)
        .function(console_method(id, ConsoleChannel::Log), js_string!("info"), 0)
        .function(console_method(id, ConsoleChannel::Log), js_string!("debug"), 0)
        .function(console_method(id, ConsoleChannel::Error), js_string!("warn"), 0)
        .function(console_method(id, ConsoleChannel::Error), js_string!("error"), 0)
        .build();
    context.register_global_property(js_string!("console"), console, Attribute::all())?;

    let markup = document.as_str();
    let title = markup::title(markup).unwrap_or_default();
    let body_markup = markup::body(markup).unwrap_or_default();
    let body = ObjectInitializer::new(context)
        .property(
            js_string!("innerHTML"),
            JsString::from(body_markup.as_str()),
            Attribute::all(),
        )
        .build();
    let document = ObjectInitializer::new(context)
        .property(js_string!("title"), JsString::from(title.as_str()), Attribute::all())
        .property(js_string!("body"), body, Attribute::all())
        .build();
    context.register_global_property(js_string!("document"), document, Attribute::all())?;

    let global = context.global_object();
    context.register_global_property(js_string!("window"), global.clone(), Attribute::all())?;
    context.register_global_property(js_string!("self"), global, Attribute::all())?;
    Ok(())
}

fn console_method(id: RealmId, channel: ConsoleChannel) -> NativeFunction {
    NativeFunction::from_copy_closure(move |_this, args, ctx| {
        let text = args
            .iter()
            .map(|arg| stringify(arg, ctx))
            .collect::<Vec<_>>()
            .join(" ");
        dispatch(id, channel, &text);
        Ok(JsValue::undefined())
    })
}

/// String form of a value; falls back to the engine's display form for values
/// whose conversion throws (symbols, objects with a throwing `toString`).
fn stringify(value: &JsValue, context: &mut Context) -> String {
    match value.to_string(context) {
        Ok(text) => text.to_std_string_escaped(),
        Err(_) => value.display().to_string(),
    }
}

fn thrown_message(err: &JsError, context: &mut Context) -> String {
    if let Some(value) = err.as_opaque() {
        if let Some(object) = value.as_object()
            && let Ok(message) = object.get(js_string!("message"), context)
            && !message.is_undefined()
        {
            return stringify(&message, context);
        }
        return stringify(value, context);
    }
    match err.try_native(context) {
        Ok(native) => native.message().to_string(),
        Err(_) => err.to_string(),
    }
}

#![forbid(unsafe_code)]

//! Host integration layer: component lifecycle, mixin hooks, and the
//! provide/inject channel.
//!
//! The [`Host`] is the single logical thread of control: it owns the deferred
//! [`Scheduler`], the provenance [`ContextStack`], and the diagnostic
//! [`ViolationLog`]. Plugins contribute [`Mixin`]s — named pairs of lifecycle
//! hooks — that run for every component the host creates or mounts.
//!
//! A [`Component`] owns its reactive store and derived-value registry, its
//! provided shared instances, and a parent link; descendants resolve shared
//! instances by walking that chain ([`Component::inject`]).
//!
//! # Lifecycle
//!
//! 1. [`Host::create_component`] validates the declaration (unique shared
//!    keys), builds the component, and runs every `before_create` hook.
//! 2. [`Host::mount`] runs every `mounted` hook, exactly once per component.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use steward_core::{CallContext, ComponentId, ContextStack, SharedObject};
use steward_reactive::{ComputedRegistry, ReactiveStore, Scheduler, WatchSubscription};

use crate::error::{Result, StewardError};
use crate::guard::ViolationLog;

// ─── Shared declarations ─────────────────────────────────────────────────────

/// How a component obtains a shared instance: build one per component via a
/// factory, or reuse an existing object.
pub enum SharedSource {
    Factory(Box<dyn Fn() -> Rc<SharedObject>>),
    Instance(Rc<SharedObject>),
}

impl SharedSource {
    #[must_use]
    pub fn factory(f: impl Fn() -> Rc<SharedObject> + 'static) -> Self {
        Self::Factory(Box::new(f))
    }

    #[must_use]
    pub fn instance(obj: Rc<SharedObject>) -> Self {
        Self::Instance(obj)
    }

    /// Produce the instance this source addresses.
    #[must_use]
    pub fn realize(&self) -> Rc<SharedObject> {
        match self {
            Self::Factory(f) => f(),
            Self::Instance(obj) => Rc::clone(obj),
        }
    }
}

impl std::fmt::Debug for SharedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Factory(_) => f.write_str("Factory"),
            Self::Instance(obj) => f.debug_tuple("Instance").field(&obj.id()).finish(),
        }
    }
}

/// Component declaration: a name plus ordered shared-instance declarations.
#[derive(Debug, Default)]
pub struct ComponentOptions {
    name: String,
    shared: Vec<(String, SharedSource)>,
}

impl ComponentOptions {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Vec::new(),
        }
    }

    /// Declare a shared instance under `key`. Keys must be unique within the
    /// component; duplicates are rejected at creation time.
    #[must_use]
    pub fn shared(mut self, key: impl Into<String>, source: SharedSource) -> Self {
        self.shared.push((key.into(), source));
        self
    }
}

// ─── Mixin ───────────────────────────────────────────────────────────────────

type HookFn = dyn Fn(&Host, &Rc<Component>) -> Result<()>;

/// Named pair of lifecycle hooks contributed by a plugin.
#[derive(Clone)]
pub struct Mixin {
    name: &'static str,
    before_create: Option<Rc<HookFn>>,
    mounted: Option<Rc<HookFn>>,
}

impl Mixin {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            before_create: None,
            mounted: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Hook run while a component is being created, before its reactive
    /// state is considered final.
    #[must_use]
    pub fn on_before_create(
        mut self,
        hook: impl Fn(&Host, &Rc<Component>) -> Result<()> + 'static,
    ) -> Self {
        self.before_create = Some(Rc::new(hook));
        self
    }

    /// Hook run at first render.
    #[must_use]
    pub fn on_mounted(
        mut self,
        hook: impl Fn(&Host, &Rc<Component>) -> Result<()> + 'static,
    ) -> Self {
        self.mounted = Some(Rc::new(hook));
        self
    }
}

impl std::fmt::Debug for Mixin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixin")
            .field("name", &self.name)
            .field("before_create", &self.before_create.is_some())
            .field("mounted", &self.mounted.is_some())
            .finish()
    }
}

// ─── Component ───────────────────────────────────────────────────────────────

/// One component instance in the tree.
pub struct Component {
    id: ComponentId,
    name: String,
    shared: Vec<(String, SharedSource)>,
    parent: Option<Weak<Component>>,
    store: Rc<ReactiveStore>,
    computed: Rc<ComputedRegistry>,
    provided: RefCell<AHashMap<String, Rc<SharedObject>>>,
    guards: RefCell<Vec<WatchSubscription>>,
    mounted: Cell<bool>,
}

impl Component {
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This component's backing store for shared state.
    #[must_use]
    pub fn store(&self) -> &Rc<ReactiveStore> {
        &self.store
    }

    /// This component's derived-value registry.
    #[must_use]
    pub fn computed(&self) -> &Rc<ComputedRegistry> {
        &self.computed
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    /// The ordered shared declarations of this component.
    #[must_use]
    pub fn shared_declarations(&self) -> &[(String, SharedSource)] {
        &self.shared
    }

    /// Publish a shared instance under `key` for this component's subtree.
    pub fn provide(&self, key: impl Into<String>, instance: Rc<SharedObject>) {
        self.provided.borrow_mut().insert(key.into(), instance);
    }

    /// Instance provided by this component itself.
    #[must_use]
    pub fn provided(&self, key: &str) -> Option<Rc<SharedObject>> {
        self.provided.borrow().get(key).map(Rc::clone)
    }

    /// Resolve `key` here or in the nearest providing ancestor.
    #[must_use]
    pub fn inject(&self, key: &str) -> Option<Rc<SharedObject>> {
        if let Some(instance) = self.provided(key) {
            return Some(instance);
        }
        let mut cursor = self.parent.clone();
        while let Some(weak) = cursor {
            let Some(parent) = weak.upgrade() else {
                break;
            };
            if let Some(instance) = parent.provided(key) {
                return Some(instance);
            }
            cursor = parent.parent.clone();
        }
        None
    }

    pub(crate) fn push_guard(&self, guard: WatchSubscription) {
        self.guards.borrow_mut().push(guard);
    }

    pub(crate) fn set_mounted(&self) {
        self.mounted.set(true);
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id.raw())
            .field("name", &self.name)
            .field("mounted", &self.mounted.get())
            .field("provided", &self.provided.borrow().len())
            .finish()
    }
}

// ─── Host ────────────────────────────────────────────────────────────────────

/// The single logical thread of control: scheduler, context stack, mixin
/// registry, diagnostics.
pub struct Host {
    scheduler: Rc<Scheduler>,
    stack: ContextStack,
    mixins: RefCell<Vec<Mixin>>,
    installed: RefCell<HashSet<&'static str>>,
    violations: ViolationLog,
    next_component: Cell<u64>,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scheduler: Rc::new(Scheduler::new()),
            stack: ContextStack::new(),
            mixins: RefCell::new(Vec::new()),
            installed: RefCell::new(HashSet::new()),
            violations: ViolationLog::new(),
            next_component: Cell::new(1),
        }
    }

    /// Register a mixin. Idempotent per name: a second registration under the
    /// same name is ignored and reported as `false`.
    pub fn register_mixin(&self, mixin: Mixin) -> bool {
        if !self.installed.borrow_mut().insert(mixin.name()) {
            tracing::debug!(name = mixin.name(), "mixin already installed; skipping");
            return false;
        }
        self.mixins.borrow_mut().push(mixin);
        true
    }

    /// Whether a mixin with this name is installed.
    #[must_use]
    pub fn has_mixin(&self, name: &str) -> bool {
        self.installed.borrow().contains(name)
    }

    /// The deferred task queue (the "next tick" boundary).
    #[must_use]
    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    /// The provenance stack owned by this host.
    #[must_use]
    pub fn context_stack(&self) -> &ContextStack {
        &self.stack
    }

    /// The diagnostic channel for provenance violations.
    #[must_use]
    pub fn violations(&self) -> &ViolationLog {
        &self.violations
    }

    /// Defer `task` to the next settling boundary.
    pub fn next_tick(&self, task: impl FnOnce() + 'static) {
        self.scheduler.defer(task);
    }

    /// Drain deferred work (frame pops included) to quiescence.
    pub fn flush(&self) {
        self.scheduler.flush();
    }

    /// Top provenance frame, if any — for diagnostics tooling.
    #[must_use]
    pub fn current_context(&self) -> Option<CallContext> {
        self.stack.current()
    }

    /// Run `action` attributed to `ctx`, with the same deferred-pop semantics
    /// wired methods get. For advanced consumers wrapping their own calls.
    pub fn within_context<R>(&self, ctx: Option<CallContext>, action: impl FnOnce() -> R) -> R {
        self.stack.within(ctx, self.scheduler.as_ref(), action)
    }

    /// Create a component: validate its declaration, then run every
    /// `before_create` hook. A hook error aborts creation.
    pub fn create_component(
        &self,
        options: ComponentOptions,
        parent: Option<&Rc<Component>>,
    ) -> Result<Rc<Component>> {
        let mut seen = HashSet::new();
        for (key, _) in &options.shared {
            if !seen.insert(key.as_str()) {
                return Err(StewardError::DuplicateSharedKey {
                    component: options.name.clone(),
                    key: key.clone(),
                });
            }
        }

        let id = ComponentId::new(self.next_component.get());
        self.next_component.set(id.raw() + 1);

        let component = Rc::new(Component {
            id,
            name: options.name,
            shared: options.shared,
            parent: parent.map(Rc::downgrade),
            store: Rc::new(ReactiveStore::new()),
            computed: Rc::new(ComputedRegistry::new()),
            provided: RefCell::new(AHashMap::new()),
            guards: RefCell::new(Vec::new()),
            mounted: Cell::new(false),
        });

        let hooks: Vec<Rc<HookFn>> = self
            .mixins
            .borrow()
            .iter()
            .filter_map(|m| m.before_create.clone())
            .collect();
        for hook in hooks {
            hook(self, &component)?;
        }

        tracing::debug!(id = id.raw(), name = %component.name, "created component");
        Ok(component)
    }

    /// First render: run every `mounted` hook, exactly once per component.
    pub fn mount(&self, component: &Rc<Component>) -> Result<()> {
        if component.is_mounted() {
            return Err(StewardError::AlreadyMounted { id: component.id() });
        }
        let hooks: Vec<Rc<HookFn>> = self
            .mixins
            .borrow()
            .iter()
            .filter_map(|m| m.mounted.clone())
            .collect();
        for hook in hooks {
            hook(self, component)?;
        }
        component.set_mounted();
        tracing::debug!(id = component.id().raw(), "mounted component");
        Ok(())
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("mixins", &self.mixins.borrow().len())
            .field("pending", &self.scheduler.pending())
            .field("violations", &self.violations.len())
            .finish()
    }
}

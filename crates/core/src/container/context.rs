//! Contextual instance management
//!
//! Each normal scope owns a bean store holding at most one instance per
//! bean identity while the scope is active. The dependent pseudo-scope
//! never caches; its instances belong to the creational context of the
//! requesting injection. The application scope's store is shared across
//! threads, so its get-or-create is atomic per bean identity.

use crate::container::bean::{Bean, BeanId, Instance};
use crate::errors::ContainerError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Instance caching policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Pseudo-scope: a new instance per injection, never cached
    Dependent,
    /// Singleton-equivalent scope for the container's lifetime
    Application,
    /// Scoped to a single unit of work
    Request,
    /// Long-running, passivating scope
    Conversation,
}

impl Scope {
    /// Normal scopes cache instances per active context
    pub fn is_normal(&self) -> bool {
        !matches!(self, Scope::Dependent)
    }

    /// Passivating scopes require passivation-capable beans
    pub fn is_passivating(&self) -> bool {
        matches!(self, Scope::Conversation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Dependent => "dependent",
            Scope::Application => "application",
            Scope::Request => "request",
            Scope::Conversation => "conversation",
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Dependent
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dependent" => Ok(Scope::Dependent),
            "application" | "applicationscoped" => Ok(Scope::Application),
            "request" | "requestscoped" => Ok(Scope::Request),
            "conversation" | "conversationscoped" => Ok(Scope::Conversation),
            _ => Err(ContainerError::UnknownScope {
                scope: s.to_string(),
            }),
        }
    }
}

/// Tracks dependent instances created on behalf of one injection request so
/// they can be destroyed together
pub struct CreationalContext {
    dependents: Vec<(Arc<Bean>, Instance)>,
}

impl CreationalContext {
    pub fn new() -> Self {
        Self {
            dependents: Vec::new(),
        }
    }

    /// Record a dependent instance owned by this context
    pub fn track_dependent(&mut self, bean: Arc<Bean>, instance: Instance) {
        self.dependents.push((bean, instance));
    }

    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    /// Destroy all tracked dependents in reverse creation order.
    /// Best-effort: one failed destroy never abandons the rest.
    pub fn release(&mut self) -> Vec<ContainerError> {
        let mut failures = Vec::new();
        while let Some((bean, instance)) = self.dependents.pop() {
            if let Err(e) = bean.destroy(instance) {
                failures.push(e);
            }
        }
        failures
    }
}

impl Default for CreationalContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Context activation state: Inactive -> Active -> Inactive, nothing else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextState {
    Inactive,
    Active,
}

/// Per-activation bean store
struct BeanStore {
    id: Uuid,
    instances: HashMap<BeanId, (Arc<Bean>, Instance)>,
}

impl BeanStore {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            instances: HashMap::new(),
        }
    }
}

struct ScopeContext {
    state: ContextState,
    store: BeanStore,
}

/// One normal scope's context slot
struct ScopeSlot {
    scope: Scope,
    inner: RwLock<ScopeContext>,
    /// Per-bean creation guards: two threads racing to create the same
    /// bean serialize here, while creations of different beans proceed
    /// independently (nested resolution must not deadlock).
    creation_guards: Mutex<HashMap<BeanId, Arc<Mutex<()>>>>,
}

impl ScopeSlot {
    fn new(scope: Scope) -> Self {
        Self {
            scope,
            inner: RwLock::new(ScopeContext {
                state: ContextState::Inactive,
                store: BeanStore::new(),
            }),
            creation_guards: Mutex::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, ScopeContext>, ContainerError> {
        self.inner
            .read()
            .map_err(|_| ContainerError::lock(self.scope.as_str()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, ScopeContext>, ContainerError> {
        self.inner
            .write()
            .map_err(|_| ContainerError::lock(self.scope.as_str()))
    }

    fn creation_guard(&self, bean_id: BeanId) -> Result<Arc<Mutex<()>>, ContainerError> {
        let mut guards = self
            .creation_guards
            .lock()
            .map_err(|_| ContainerError::lock(self.scope.as_str()))?;
        Ok(guards.entry(bean_id).or_default().clone())
    }
}

/// Per-scope storage of contextual instances
pub struct ContextManager {
    application: ScopeSlot,
    request: ScopeSlot,
    conversation: ScopeSlot,
}

impl ContextManager {
    pub fn new() -> Self {
        Self {
            application: ScopeSlot::new(Scope::Application),
            request: ScopeSlot::new(Scope::Request),
            conversation: ScopeSlot::new(Scope::Conversation),
        }
    }

    fn slot(&self, scope: Scope) -> Option<&ScopeSlot> {
        match scope {
            Scope::Dependent => None,
            Scope::Application => Some(&self.application),
            Scope::Request => Some(&self.request),
            Scope::Conversation => Some(&self.conversation),
        }
    }

    fn normal_slot(&self, scope: Scope, operation: &str) -> Result<&ScopeSlot, ContainerError> {
        self.slot(scope).ok_or_else(|| {
            ContainerError::illegal_state(
                operation,
                format!("the {} pseudo-scope has no context", scope),
            )
        })
    }

    /// Activate a normal scope with a fresh bean store.
    ///
    /// Activating an already-active scope would silently lose the prior
    /// store, so it is reported as a context-state error.
    pub fn activate(&self, scope: Scope) -> Result<(), ContainerError> {
        let slot = self.normal_slot(scope, "activate")?;
        let mut ctx = slot.write()?;
        if ctx.state == ContextState::Active {
            return Err(ContainerError::context_not_active(
                scope.as_str(),
                "activate: context is already active",
            ));
        }
        ctx.store = BeanStore::new();
        ctx.state = ContextState::Active;
        debug!(scope = scope.as_str(), store = %ctx.store.id, "context activated");
        Ok(())
    }

    /// Check whether a scope's context is active
    pub fn is_active(&self, scope: Scope) -> bool {
        match self.slot(scope) {
            Some(slot) => slot
                .read()
                .map(|ctx| ctx.state == ContextState::Active)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Get or create the contextual instance of a bean.
    ///
    /// Dependent beans always get a fresh instance tied to the creational
    /// context. Normal-scope beans get the cached instance of the active
    /// context, creating it at most once per bean identity.
    pub fn get(
        &self,
        bean: &Arc<Bean>,
        ctx: &mut CreationalContext,
    ) -> Result<Instance, ContainerError> {
        let scope = bean.attributes().scope();
        if scope == Scope::Dependent {
            let instance = bean.create(ctx)?;
            ctx.track_dependent(bean.clone(), instance.clone());
            return Ok(instance);
        }

        let slot = self.normal_slot(scope, "get")?;

        // Fast path: already cached in the active store.
        {
            let context = slot.read()?;
            if context.state != ContextState::Active {
                return Err(ContainerError::context_not_active(scope.as_str(), "get"));
            }
            if let Some((_, instance)) = context.store.instances.get(&bean.id()) {
                return Ok(instance.clone());
            }
        }

        // Slow path: serialize creation per bean identity, without holding
        // the store lock while the producer runs.
        let guard = slot.creation_guard(bean.id())?;
        let _creating = guard
            .lock()
            .map_err(|_| ContainerError::lock(scope.as_str()))?;

        {
            let context = slot.read()?;
            if context.state != ContextState::Active {
                return Err(ContainerError::context_not_active(scope.as_str(), "get"));
            }
            if let Some((_, instance)) = context.store.instances.get(&bean.id()) {
                return Ok(instance.clone());
            }
        }

        let instance = bean.create(ctx)?;

        let mut context = slot.write()?;
        if context.state != ContextState::Active {
            // The context ended while the producer ran; the instance never
            // entered the store, so release it here.
            let _ = bean.destroy(instance);
            return Err(ContainerError::context_not_active(scope.as_str(), "get"));
        }
        context
            .store
            .instances
            .insert(bean.id(), (bean.clone(), instance.clone()));
        Ok(instance)
    }

    /// Destroy the cached instance of a bean in its scope's active context.
    /// No-op when the context is inactive or holds no instance.
    pub fn destroy(&self, bean: &Arc<Bean>) -> Result<(), ContainerError> {
        let scope = bean.attributes().scope();
        let slot = match self.slot(scope) {
            Some(slot) => slot,
            None => return Ok(()),
        };
        let removed = {
            let mut context = slot.write()?;
            if context.state != ContextState::Active {
                return Ok(());
            }
            context.store.instances.remove(&bean.id())
        };
        match removed {
            Some((bean, instance)) => bean.destroy(instance),
            None => Ok(()),
        }
    }

    /// End a scope's context: destroy every stored instance (best-effort,
    /// deterministic order), clear the store and deactivate.
    pub fn end_context(&self, scope: Scope) -> Result<(), ContainerError> {
        let slot = self.normal_slot(scope, "end_context")?;
        let entries = {
            let mut context = slot.write()?;
            if context.state != ContextState::Active {
                return Err(ContainerError::context_not_active(
                    scope.as_str(),
                    "end_context",
                ));
            }
            context.state = ContextState::Inactive;
            std::mem::replace(&mut context.store, BeanStore::new())
        };

        let mut entries: Vec<(Arc<Bean>, Instance)> = entries.instances.into_values().collect();
        entries.sort_by_key(|(bean, _)| bean.id());

        let mut failures = Vec::new();
        let destroyed = entries.len();
        for (bean, instance) in entries {
            if let Err(e) = bean.destroy(instance) {
                failures.push(e);
            }
        }
        debug!(
            scope = scope.as_str(),
            destroyed,
            failures = failures.len(),
            "context ended"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::Destruction { failures })
        }
    }

    /// End every active context, conversation first, application last.
    /// Returns collected failures; teardown never stops early.
    pub fn end_all(&self) -> Vec<ContainerError> {
        let mut failures = Vec::new();
        for scope in [Scope::Conversation, Scope::Request, Scope::Application] {
            if self.is_active(scope) {
                if let Err(e) = self.end_context(scope) {
                    failures.push(e);
                }
            }
        }
        failures
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::attributes::BeanAttributes;
    use crate::container::bean::ClosureProducer;
    use crate::container::types::BeanType;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bean_in(scope: Scope) -> Arc<Bean> {
        counting_bean_in(scope, Arc::new(AtomicUsize::new(0)))
    }

    fn counting_bean_in(scope: Scope, created: Arc<AtomicUsize>) -> Arc<Bean> {
        let mut types = BTreeSet::new();
        types.insert(BeanType::class("Widget"));
        let attributes = BeanAttributes::builder(types).scope(scope).build().unwrap();
        let producer = Arc::new(ClosureProducer::of_value(move || {
            created.fetch_add(1, Ordering::SeqCst)
        }));
        Arc::new(Bean::builder("Widget", attributes, producer).build())
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("dependent".parse::<Scope>().unwrap(), Scope::Dependent);
        assert_eq!("ApplicationScoped".parse::<Scope>().unwrap(), Scope::Application);
        assert_eq!("request".parse::<Scope>().unwrap(), Scope::Request);
        assert_eq!("ConversationScoped".parse::<Scope>().unwrap(), Scope::Conversation);
        assert!("session".parse::<Scope>().is_err());
    }

    #[test]
    fn test_unrecognized_scope_is_a_definition_error() {
        let err = "session".parse::<Scope>().unwrap_err();
        assert!(err.is_definition());
    }

    #[test]
    fn test_normal_scope_get_is_idempotent() {
        let manager = ContextManager::new();
        manager.activate(Scope::Request).unwrap();
        let bean = bean_in(Scope::Request);
        let mut cc = CreationalContext::new();

        let first = manager.get(&bean, &mut cc).unwrap();
        let second = manager.get(&bean, &mut cc).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_dependent_scope_never_caches() {
        let manager = ContextManager::new();
        let created = Arc::new(AtomicUsize::new(0));
        let bean = counting_bean_in(Scope::Dependent, created.clone());

        let mut cc1 = CreationalContext::new();
        let mut cc2 = CreationalContext::new();
        let first = manager.get(&bean, &mut cc1).unwrap();
        let second = manager.get(&bean, &mut cc2).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(cc1.dependent_count(), 1);
        assert_eq!(cc2.dependent_count(), 1);
    }

    #[test]
    fn test_get_on_inactive_context_fails() {
        let manager = ContextManager::new();
        let bean = bean_in(Scope::Request);
        let mut cc = CreationalContext::new();

        let err = manager.get(&bean, &mut cc).unwrap_err();
        assert!(err.is_context_not_active());
    }

    #[test]
    fn test_double_activation_is_reported() {
        let manager = ContextManager::new();
        manager.activate(Scope::Request).unwrap();
        let err = manager.activate(Scope::Request).unwrap_err();
        assert!(err.is_context_not_active());
    }

    #[test]
    fn test_end_context_destroys_all_despite_failures() {
        let manager = ContextManager::new();
        manager.activate(Scope::Request).unwrap();
        let destroyed = Arc::new(AtomicUsize::new(0));

        let mut beans = Vec::new();
        for i in 0..3 {
            let mut types = BTreeSet::new();
            types.insert(BeanType::class(format!("Widget{}", i)));
            let attributes = BeanAttributes::builder(types)
                .scope(Scope::Request)
                .build()
                .unwrap();
            let count = destroyed.clone();
            let failing = i == 1;
            let producer = Arc::new(
                ClosureProducer::of_value(move || i).with_dispose(move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                    if failing {
                        Err(ContainerError::creation("Widget1", "dispose blew up"))
                    } else {
                        Ok(())
                    }
                }),
            );
            beans.push(Arc::new(
                Bean::builder(format!("Widget{}", i), attributes, producer).build(),
            ));
        }

        let mut cc = CreationalContext::new();
        for bean in &beans {
            manager.get(bean, &mut cc).unwrap();
        }

        let err = manager.end_context(Scope::Request).unwrap_err();
        // All three dispose hooks ran even though one failed.
        assert_eq!(destroyed.load(Ordering::SeqCst), 3);
        match err {
            ContainerError::Destruction { failures } => assert_eq!(failures.len(), 1),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!manager.is_active(Scope::Request));
    }

    #[test]
    fn test_reactivation_gets_fresh_store() {
        let manager = ContextManager::new();
        manager.activate(Scope::Request).unwrap();
        let created = Arc::new(AtomicUsize::new(0));
        let bean = counting_bean_in(Scope::Request, created.clone());

        let mut cc = CreationalContext::new();
        manager.get(&bean, &mut cc).unwrap();
        manager.end_context(Scope::Request).unwrap();

        manager.activate(Scope::Request).unwrap();
        manager.get(&bean, &mut cc).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_explicit_destroy_removes_entry() {
        let manager = ContextManager::new();
        manager.activate(Scope::Request).unwrap();
        let created = Arc::new(AtomicUsize::new(0));
        let bean = counting_bean_in(Scope::Request, created.clone());
        let mut cc = CreationalContext::new();

        manager.get(&bean, &mut cc).unwrap();
        manager.destroy(&bean).unwrap();
        manager.get(&bean, &mut cc).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);

        // Destroying an absent entry is a no-op.
        manager.destroy(&bean).unwrap();
        manager.destroy(&bean).unwrap();
    }

    #[test]
    fn test_application_scope_concurrent_get_creates_once() {
        let manager = Arc::new(ContextManager::new());
        manager.activate(Scope::Application).unwrap();
        let created = Arc::new(AtomicUsize::new(0));
        let bean = counting_bean_in(Scope::Application, created.clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let bean = bean.clone();
            handles.push(std::thread::spawn(move || {
                let mut cc = CreationalContext::new();
                manager.get(&bean, &mut cc).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_creational_context_release_reverse_order() {
        let manager = ContextManager::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut cc = CreationalContext::new();
        for i in 0..2 {
            let mut types = BTreeSet::new();
            types.insert(BeanType::class(format!("Dep{}", i)));
            let attributes = BeanAttributes::builder(types).build().unwrap();
            let log = order.clone();
            let producer = Arc::new(
                ClosureProducer::of_value(move || i).with_dispose(move |_| {
                    log.lock().unwrap().push(i);
                    Ok(())
                }),
            );
            let bean = Arc::new(Bean::builder(format!("Dep{}", i), attributes, producer).build());
            manager.get(&bean, &mut cc).unwrap();
        }

        let failures = cc.release();
        assert!(failures.is_empty());
        assert_eq!(*order.lock().unwrap(), vec![1, 0]);
    }
}

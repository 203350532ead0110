use std::sync::{Arc, Mutex, PoisonError};

use crate::persons::domain::person::Person;
use crate::service::domain::face_service::FaceService;
use crate::shared::settings::RefreshPolicy;
use crate::shared::workflow_error::WorkflowError;

/// Proof that the user confirmed deleting `name`.
///
/// Only the presentation layer should construct one, after asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionConfirmed {
    name: String,
}

impl DeletionConfirmed {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
struct RegistryCache {
    persons: Vec<Person>,
    stale: bool,
    // Bumped by every invalidation; a fetch that started before one stays stale.
    generation: u64,
}

/// Client-side cache of known persons, synchronized with the service.
///
/// The cache is the only place `trained` is read from. Mutations never edit
/// entries in place; they call [`PersonRegistry::invalidate`] and the
/// [`RefreshPolicy`] decides when the next fetch happens.
pub struct PersonRegistry {
    service: Arc<dyn FaceService>,
    policy: RefreshPolicy,
    cache: Mutex<RegistryCache>,
}

impl PersonRegistry {
    pub fn new(service: Arc<dyn FaceService>, policy: RefreshPolicy) -> Self {
        Self {
            service,
            policy,
            cache: Mutex::new(RegistryCache {
                persons: Vec::new(),
                stale: true,
                generation: 0,
            }),
        }
    }

    /// Fetches the person list and replaces the cache with it.
    ///
    /// On failure the previous cache contents are kept. An invalidation that
    /// lands while the fetch is running leaves the cache stale.
    pub fn list(&self) -> Result<Vec<Person>, WorkflowError> {
        let started = self.lock().generation;
        let persons = self.service.list_persons()?;
        log::debug!("Fetched {} person(s)", persons.len());
        let mut cache = self.lock();
        cache.persons = persons.clone();
        cache.stale = cache.generation != started;
        Ok(persons)
    }

    /// Cached list, refreshed first if it has been invalidated.
    pub fn persons(&self) -> Result<Vec<Person>, WorkflowError> {
        if self.is_stale() {
            return self.list();
        }
        Ok(self.cached())
    }

    /// Cached list without touching the network.
    pub fn cached(&self) -> Vec<Person> {
        self.lock().persons.clone()
    }

    pub fn get(&self, name: &str) -> Option<Person> {
        self.lock().persons.iter().find(|p| p.name == name).cloned()
    }

    pub fn is_stale(&self) -> bool {
        self.lock().stale
    }

    /// Marks the cache stale after a server-side change.
    ///
    /// Under [`RefreshPolicy::Immediate`] the list is re-fetched right away; a
    /// failed fetch is logged and the cache stays stale.
    pub fn invalidate(&self) {
        {
            let mut cache = self.lock();
            cache.stale = true;
            cache.generation += 1;
        }
        if self.policy == RefreshPolicy::Immediate {
            if let Err(e) = self.list() {
                log::warn!("Person list refresh failed: {e}");
            }
        }
    }

    /// Creates a person. Surrounding whitespace is trimmed; an empty name is
    /// rejected without contacting the service.
    pub fn create(&self, name: &str) -> Result<Person, WorkflowError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::Validation("person name is empty".into()));
        }
        self.service.create_person(name)?;
        log::info!("Created person '{name}'");
        self.invalidate();
        Ok(Person::new(name, false))
    }

    /// Deletes a person. Deleting an unknown name surfaces the server's error.
    pub fn delete(&self, confirmation: DeletionConfirmed) -> Result<(), WorkflowError> {
        let name = confirmation.name();
        self.service.delete_person(name)?;
        log::info!("Deleted person '{name}'");
        self.invalidate();
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

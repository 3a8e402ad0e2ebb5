//! Engine lifecycle.
//!
//! [`OrmService::start`] opens the pool, synchronizes every declared entity and
//! hands one adapter per declared repository back to the [`BeanRegistry`].
//! [`OrmService::shutdown`] closes the pool.

use crate::config::{Config, DispatchOptions};
use crate::db::{ConnectionPool, SchemaSynchronizer, SyncOutcome};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectSettings, Entity, EntityDescriptor, RepositoryDescriptor};
use crate::orm::dispatcher::Repository;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A shared, type-erased registry entry.
pub type Bean = Arc<dyn Any + Send + Sync>;

/// A typed adapter over [`Repository`], usually generated by
/// [`repository!`](crate::repository).
pub trait RepositoryAdapter: Sized + Send + Sync + 'static {
    type Entity: Entity;

    /// Registration name of the adapter.
    const NAME: &'static str;

    fn declare() -> DbResult<RepositoryDescriptor>;

    fn from_repository(inner: Repository<Self::Entity>) -> Self;

    fn repository(&self) -> &Repository<Self::Entity>;

    /// Validate the declaration and bind it to a pool.
    fn build(pool: Arc<ConnectionPool>, options: DispatchOptions) -> DbResult<Self> {
        let descriptor = Arc::new(Self::declare()?);
        Ok(Self::from_repository(Repository::new(
            pool, descriptor, options,
        )?))
    }
}

/// An entity type known to the registry.
#[derive(Clone, Copy)]
pub struct EntityDeclaration {
    pub name: &'static str,
    descriptor: fn() -> DbResult<&'static EntityDescriptor>,
}

impl EntityDeclaration {
    pub fn of<E: Entity>() -> Self {
        Self {
            name: std::any::type_name::<E>(),
            descriptor: E::descriptor,
        }
    }

    pub fn descriptor(&self) -> DbResult<&'static EntityDescriptor> {
        (self.descriptor)()
    }
}

impl std::fmt::Debug for EntityDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDeclaration")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A repository type known to the registry.
#[derive(Clone, Copy)]
pub struct RepositoryDeclaration {
    pub name: &'static str,
    build: fn(Arc<ConnectionPool>, DispatchOptions) -> DbResult<Bean>,
}

impl RepositoryDeclaration {
    pub fn of<R: RepositoryAdapter>() -> Self {
        Self {
            name: R::NAME,
            build: build_bean::<R>,
        }
    }

    pub fn build(&self, pool: Arc<ConnectionPool>, options: DispatchOptions) -> DbResult<Bean> {
        (self.build)(pool, options)
    }
}

impl std::fmt::Debug for RepositoryDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryDeclaration")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn build_bean<R: RepositoryAdapter>(
    pool: Arc<ConnectionPool>,
    options: DispatchOptions,
) -> DbResult<Bean> {
    let adapter: Bean = Arc::new(R::build(pool, options)?);
    Ok(adapter)
}

/// The host application's registry of declared types and built instances.
pub trait BeanRegistry: Send {
    /// Entity types whose tables should be synchronized.
    fn entities(&self) -> Vec<EntityDeclaration>;

    /// Repository types that need an adapter.
    fn repositories(&self) -> Vec<RepositoryDeclaration>;

    /// Receive a built adapter.
    fn add_bean(&mut self, name: &str, bean: Bean);
}

/// A registry kept in memory, for hosts without their own container.
#[derive(Default)]
pub struct InMemoryRegistry {
    entities: Vec<EntityDeclaration>,
    repositories: Vec<RepositoryDeclaration>,
    beans: HashMap<String, Bean>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entity<E: Entity>(&mut self) -> &mut Self {
        self.entities.push(EntityDeclaration::of::<E>());
        self
    }

    pub fn register_repository<R: RepositoryAdapter>(&mut self) -> &mut Self {
        self.repositories.push(RepositoryDeclaration::of::<R>());
        self
    }

    /// Fetch a registered bean by name and type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.beans.get(name).cloned()?.downcast::<T>().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.beans.contains_key(name)
    }

    pub fn bean_count(&self) -> usize {
        self.beans.len()
    }
}

impl BeanRegistry for InMemoryRegistry {
    fn entities(&self) -> Vec<EntityDeclaration> {
        self.entities.clone()
    }

    fn repositories(&self) -> Vec<RepositoryDeclaration> {
        self.repositories.clone()
    }

    fn add_bean(&mut self, name: &str, bean: Bean) {
        self.beans.insert(name.to_string(), bean);
    }
}

impl std::fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRegistry")
            .field("entities", &self.entities)
            .field("repositories", &self.repositories)
            .field("beans", &self.beans.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Synchronization result for one entity.
#[derive(Debug)]
pub struct EntitySync {
    pub entity: &'static str,
    pub table: Option<String>,
    pub outcome: DbResult<SyncOutcome>,
}

/// A repository that could not be registered.
#[derive(Debug)]
pub struct RepositoryFailure {
    pub repository: &'static str,
    pub error: DbError,
}

/// A started engine.
#[derive(Debug)]
pub struct OrmService {
    pool: Arc<ConnectionPool>,
    sync_report: Vec<EntitySync>,
    registered: Vec<&'static str>,
    repository_failures: Vec<RepositoryFailure>,
}

impl OrmService {
    /// Start the engine against `registry`.
    ///
    /// A driver or connection failure aborts startup before anything is
    /// registered. Entity synchronization failures are isolated per entity and
    /// reported through [`OrmService::sync_report`]. A repository whose
    /// declaration is invalid is skipped and reported through
    /// [`OrmService::repository_failures`].
    pub async fn start(config: &Config, registry: &mut dyn BeanRegistry) -> DbResult<Self> {
        info!(url = %config.masked_database_url(), "Starting ORM engine");

        let settings = ConnectSettings::from_config(config)?;
        let pool = ConnectionPool::open(
            settings,
            config.pool_size,
            config.liveness_timeout_duration(),
        )
        .await?;

        let synchronizer = SchemaSynchronizer::new(Arc::clone(&pool));
        let mut sync_report = Vec::new();
        for declaration in registry.entities() {
            let (table, outcome) = match declaration.descriptor() {
                Ok(descriptor) => (
                    Some(descriptor.table.clone()),
                    synchronizer.synchronize(descriptor).await,
                ),
                Err(e) => (None, Err(e)),
            };
            if let Err(e) = &outcome {
                error!(entity = %declaration.name, error = %e, "Entity synchronization failed");
            }
            sync_report.push(EntitySync {
                entity: declaration.name,
                table,
                outcome,
            });
        }

        let options = config.dispatch_options();
        let mut registered = Vec::new();
        let mut repository_failures = Vec::new();
        for declaration in registry.repositories() {
            match declaration.build(Arc::clone(&pool), options) {
                Ok(bean) => {
                    registry.add_bean(declaration.name, bean);
                    registered.push(declaration.name);
                }
                Err(e) => {
                    error!(repository = %declaration.name, error = %e, "Repository not registered");
                    repository_failures.push(RepositoryFailure {
                        repository: declaration.name,
                        error: e,
                    });
                }
            }
        }

        info!(
            entities = sync_report.len(),
            repositories = registered.len(),
            "ORM engine started"
        );

        Ok(Self {
            pool,
            sync_report,
            registered,
            repository_failures,
        })
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn sync_report(&self) -> &[EntitySync] {
        &self.sync_report
    }

    /// Names of the adapters handed to the registry.
    pub fn registered(&self) -> &[&'static str] {
        &self.registered
    }

    pub fn repository_failures(&self) -> &[RepositoryFailure] {
        &self.repository_failures
    }

    /// Close every pooled connection.
    pub async fn shutdown(self) -> DbResult<()> {
        info!("Shutting down ORM engine");
        if Arc::strong_count(&self.pool) > 1 {
            warn!("Repository adapters still hold the pool; only idle connections are closed");
        }
        self.pool.close_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Tag {
        label: String,
    }

    crate::impl_entity! {
        Tag => "Tag" {
            label: String,
        }
    }

    #[test]
    fn test_registry_get_checks_type() {
        let mut registry = InMemoryRegistry::new();
        registry.add_bean("answer", Arc::new(42u32));
        assert_eq!(registry.get::<u32>("answer").as_deref(), Some(&42));
        assert!(registry.get::<String>("answer").is_none());
        assert!(registry.get::<u32>("missing").is_none());
        assert!(registry.contains("answer"));
        assert_eq!(registry.bean_count(), 1);
    }

    #[test]
    fn test_entity_declaration_resolves_descriptor() {
        let mut registry = InMemoryRegistry::new();
        registry.register_entity::<Tag>();
        let entities = registry.entities();
        assert_eq!(entities.len(), 1);
        assert!(entities[0].name.ends_with("Tag"));
        assert_eq!(entities[0].descriptor().unwrap().table, "Tag");
        let _ = Tag::default().label;
    }
}

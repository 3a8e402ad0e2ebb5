//! Integration tests for declared repositories on SQLite.
//!
//! Tests verify that:
//! - Each verb generates and runs the expected statement
//! - Results are coerced into the declared return shape
//! - Statement failures follow the execution error policy
//! - Unbounded mutations follow the unbounded mutation policy
//! - Mapping failures always reach the caller

mod common;

use aero_orm::config::{DispatchOptions, ExecutionErrorMode, UnboundedMutationMode};
use aero_orm::db::{ConnectionPool, SchemaSynchronizer};
use aero_orm::error::DbError;
use aero_orm::models::{Argument, Entity, SqlValue};
use aero_orm::orm::RepositoryAdapter;
use common::{User, exec, sqlite_pool, temp_sqlite_url};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

aero_orm::repository! {
    pub struct UserRepository: User {
        insert fn save(user: User) -> Key;
        insert fn add(user: User) -> Flag;
        query fn all() -> List;
        query fn find_by_name(name: &str = like("name")) -> List;
        query fn find_by_age_and_name(age: i32 = cond("age"), name: &str = like("name")) -> List;
        query fn get(id: i64 = cond("id")) -> Entity;
        query fn find(id: i64 = cond("id")) -> Optional;
        update fn set_age(age: i32 = column("age"), id: i64 = cond("id")) -> Count;
        update fn replace(user: User = fields(), id: i64 = cond("id")) -> Flag;
        update fn age_everyone(age: i32 = column("age")) -> Count;
        update fn touch(id: i64 = cond("id")) -> Count;
        delete fn remove(id: i64 = cond("id")) -> Flag;
        delete fn purge() -> Count;
    }
}

/// An entity over the `User` table that expects a column the table lacks.
#[derive(Debug, Default, Clone, PartialEq)]
struct UserWithEmail {
    id: Option<i64>,
    email: String,
}

aero_orm::impl_entity! {
    UserWithEmail => "User" {
        id: Option<i64>,
        email: String,
    }
}

aero_orm::repository! {
    struct UserEmailRepository: UserWithEmail {
        query fn all() -> List;
    }
}

async fn setup(options: DispatchOptions) -> (Arc<ConnectionPool>, UserRepository) {
    let url = temp_sqlite_url();
    let pool = sqlite_pool(&url, 2).await;
    SchemaSynchronizer::new(pool.clone())
        .synchronize(User::descriptor().unwrap())
        .await
        .unwrap();
    let users = UserRepository::build(pool.clone(), options).unwrap();
    (pool, users)
}

fn user(name: &str, age: i32) -> User {
    User {
        id: None,
        name: name.to_string(),
        age,
    }
}

fn names(users: &[User]) -> Vec<&str> {
    users.iter().map(|u| u.name.as_str()).collect()
}

#[tokio::test]
async fn test_insert_returns_generated_key() {
    let (_pool, users) = setup(DispatchOptions::default()).await;

    assert_eq!(users.save(user("Ada", 36)).await.unwrap(), 1);
    assert_eq!(users.save(user("Bob", 40)).await.unwrap(), 2);
    assert!(users.add(user("Cy", 20)).await.unwrap());

    let all = users.all().await.unwrap();
    assert_eq!(names(&all), vec!["Ada", "Bob", "Cy"]);
    assert_eq!(all[0].id, Some(1));
    assert_eq!(all[0].age, 36);
}

#[tokio::test]
async fn test_like_and_equal_conditions() {
    let (_pool, users) = setup(DispatchOptions::default()).await;
    for (name, age) in [("Ada", 36), ("Adam", 36), ("Bob", 36), ("Adele", 50)] {
        users.save(user(name, age)).await.unwrap();
    }

    let found = users.find_by_name("Ad").await.unwrap();
    assert_eq!(names(&found), vec!["Ada", "Adam", "Adele"]);

    let found = users.find_by_age_and_name(36, "Ad").await.unwrap();
    assert_eq!(names(&found), vec!["Ada", "Adam"]);

    assert!(users.find_by_name("zzz").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_row_shapes() {
    let (_pool, users) = setup(DispatchOptions::default()).await;
    let id = users.save(user("Ada", 36)).await.unwrap();

    assert_eq!(users.get(id).await.unwrap().name, "Ada");
    assert_eq!(users.find(id).await.unwrap().map(|u| u.age), Some(36));

    // A missing row yields the zero entity or None.
    assert_eq!(users.get(999).await.unwrap(), User::default());
    assert_eq!(users.find(999).await.unwrap(), None);
}

#[tokio::test]
async fn test_null_reads_as_zero_value() {
    let (pool, users) = setup(DispatchOptions::default()).await;
    exec(&pool, "INSERT INTO User (name, age) VALUES (NULL, NULL)").await;

    let loaded = users.get(1).await.unwrap();
    assert_eq!(loaded.id, Some(1));
    assert_eq!(loaded.name, "");
    assert_eq!(loaded.age, 0);
}

#[tokio::test]
async fn test_update_by_column_and_by_entity() {
    let (_pool, users) = setup(DispatchOptions::default()).await;
    let id = users.save(user("Ada", 36)).await.unwrap();
    users.save(user("Bob", 40)).await.unwrap();

    assert_eq!(users.set_age(37, id).await.unwrap(), 1);
    assert_eq!(users.get(id).await.unwrap().age, 37);

    // Nothing matches: zero rows affected.
    assert_eq!(users.set_age(1, 999).await.unwrap(), 0);

    let replacement = User {
        id: Some(id),
        name: "Ada L.".to_string(),
        age: 38,
    };
    assert!(users.replace(replacement.clone(), id).await.unwrap());
    assert_eq!(users.get(id).await.unwrap(), replacement);
    assert_eq!(users.find(2).await.unwrap().map(|u| u.name), Some("Bob".to_string()));
}

#[tokio::test]
async fn test_update_without_columns_is_skipped() {
    let (_pool, users) = setup(DispatchOptions::default()).await;
    let id = users.save(user("Ada", 36)).await.unwrap();

    assert_eq!(users.touch(id).await.unwrap(), 0);
    assert_eq!(users.get(id).await.unwrap().age, 36);
}

#[tokio::test]
async fn test_delete() {
    let (_pool, users) = setup(DispatchOptions::default()).await;
    let id = users.save(user("Ada", 36)).await.unwrap();
    users.save(user("Bob", 40)).await.unwrap();

    assert!(users.remove(id).await.unwrap());
    assert_eq!(names(&users.all().await.unwrap()), vec!["Bob"]);
}

/// Counts WARN events raised by the unbounded-mutation guard.
#[derive(Clone, Default)]
struct GuardWarnings(Arc<AtomicUsize>);

impl GuardWarnings {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> Layer<S> for GuardWarnings {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() == tracing::Level::WARN && meta.target() == "aero_orm::orm::guard" {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn test_unbounded_mutations_warn_by_default() {
    let warnings = GuardWarnings::default();
    let _subscriber =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(warnings.clone()));

    let (_pool, users) = setup(DispatchOptions::default()).await;
    let id = users.save(user("Ada", 36)).await.unwrap();
    users.save(user("Bob", 40)).await.unwrap();
    users.set_age(37, id).await.unwrap();
    assert_eq!(warnings.count(), 0);

    assert_eq!(users.age_everyone(1).await.unwrap(), 2);
    assert!(users.all().await.unwrap().iter().all(|u| u.age == 1));
    assert_eq!(warnings.count(), 1);

    assert!(users.remove(id).await.unwrap());
    assert_eq!(warnings.count(), 1);

    assert_eq!(users.purge().await.unwrap(), 1);
    assert!(users.all().await.unwrap().is_empty());
    assert_eq!(warnings.count(), 2);
}

#[tokio::test]
async fn test_unbounded_mutations_rejected() {
    let options =
        DispatchOptions::default().with_unbounded_mutations(UnboundedMutationMode::Reject);
    let (_pool, users) = setup(options).await;
    users.save(user("Ada", 36)).await.unwrap();

    let err = users.purge().await.unwrap_err();
    assert!(matches!(err, DbError::DangerousOperationBlocked { .. }));
    let err = users.age_everyone(1).await.unwrap_err();
    assert!(matches!(err, DbError::DangerousOperationBlocked { .. }));

    // Nothing was touched.
    let all = users.all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].age, 36);

    // Conditioned mutations still run.
    assert!(users.remove(1).await.unwrap());
}

#[tokio::test]
async fn test_statement_failure_swallowed_by_default() {
    let (pool, users) = setup(DispatchOptions::default()).await;
    let id = users.save(user("Ada", 36)).await.unwrap();

    // Duplicate primary key.
    let duplicate = User {
        id: Some(id),
        ..user("Ada", 36)
    };
    assert_eq!(users.save(duplicate.clone()).await.unwrap(), 0);
    assert!(!users.add(duplicate).await.unwrap());

    exec(&pool, "DROP TABLE User").await;
    assert!(users.all().await.unwrap().is_empty());
    assert_eq!(users.find(id).await.unwrap(), None);
    assert_eq!(users.set_age(1, id).await.unwrap(), 0);

    // The pool still has every connection.
    assert_eq!(pool.stats().idle, 2);
}

#[tokio::test]
async fn test_statement_failure_propagated() {
    let options = DispatchOptions::default().with_execution_errors(ExecutionErrorMode::Propagate);
    let (pool, users) = setup(options).await;
    let id = users.save(user("Ada", 36)).await.unwrap();

    let duplicate = User {
        id: Some(id),
        ..user("Ada", 36)
    };
    let err = users.save(duplicate).await.unwrap_err();
    assert!(matches!(err, DbError::Database { .. }));

    exec(&pool, "DROP TABLE User").await;
    assert!(users.all().await.is_err());
    assert_eq!(pool.stats().idle, 2);
}

#[tokio::test]
async fn test_mapping_failure_always_propagates() {
    let (pool, users) = setup(DispatchOptions::default()).await;
    users.save(user("Ada", 36)).await.unwrap();

    let emails = UserEmailRepository::build(pool.clone(), DispatchOptions::default()).unwrap();
    let err = emails.all().await.unwrap_err();
    assert!(err.is_mapping(), "expected mapping error, got {err:?}");
}

#[tokio::test]
async fn test_dynamic_invoke_checks_method_and_arity() {
    let (_pool, users) = setup(DispatchOptions::default()).await;
    let repository = users.repository();

    let err = repository.invoke("nope", Vec::new()).await.unwrap_err();
    assert!(matches!(err, DbError::MethodNotFound { .. }));

    let err = repository.invoke("find_by_name", Vec::new()).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));

    let returned = repository
        .invoke(
            "find_by_name",
            vec![Argument::Value(SqlValue::Text("x".to_string()))],
        )
        .await
        .unwrap();
    assert!(returned.into_list().unwrap().is_empty());
}

#[tokio::test]
async fn test_adapter_identity_and_display() {
    let url = temp_sqlite_url();
    let pool = sqlite_pool(&url, 1).await;
    let first = UserRepository::build(pool.clone(), DispatchOptions::default()).unwrap();
    let second = UserRepository::build(pool.clone(), DispatchOptions::default()).unwrap();

    assert_eq!(first, first);
    assert_ne!(first, second);
    assert!(first.to_string().starts_with("UserRepository on User"));
}

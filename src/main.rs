//! Aero ORM - demo entry point.
//!
//! Synchronizes a `User` table against the configured database, stores one
//! row through a declared repository and reads it back.

use aero_orm::config::Config;
use aero_orm::models::IdStrategy;
use aero_orm::orm::{InMemoryRegistry, OrmService};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Default, Clone)]
struct User {
    id: Option<i64>,
    name: String,
    age: i32,
}

aero_orm::impl_entity! {
    User => "User" {
        id: Option<i64> [id(IdStrategy::AutoIncrement)],
        name: String,
        age: i32,
    }
}

aero_orm::repository! {
    struct UserRepository: User {
        insert fn save(user: User) -> Key;
        query fn find_by_name(name: &str = like("name")) -> List;
        update fn set_age(age: i32 = column("age"), id: i64 = cond("id")) -> Count;
        delete fn remove(id: i64 = cond("id")) -> Flag;
    }
}

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    info!(
        url = %config.masked_database_url(),
        "Starting Aero ORM v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut registry = InMemoryRegistry::new();
    registry
        .register_entity::<User>()
        .register_repository::<UserRepository>();

    let service = match OrmService::start(&config, &mut registry).await {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "Startup failed");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {suggestion}");
            }
            return Err(e.into());
        }
    };

    let users = registry
        .get::<UserRepository>("UserRepository")
        .ok_or("UserRepository was not registered")?;

    let id = users
        .save(User {
            id: None,
            name: "Ada".to_string(),
            age: 36,
        })
        .await?;
    info!(id, "Saved user");

    let updated = users.set_age(37, id).await?;
    info!(updated, "Updated age");

    for user in users.find_by_name("Ad").await? {
        info!(id = ?user.id, name = %user.name, age = user.age, "Found user");
    }

    if !users.remove(id).await? {
        warn!(id, "User was not removed");
    }

    drop(users);
    drop(registry);
    service.shutdown().await?;
    info!("Shutdown complete");
    Ok(())
}

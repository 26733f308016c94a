#[macro_use]
extern crate rocket;

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;

use std::sync::{Arc, Once};

use crate::auth::mailer::LogMailer;
use crate::auth::{AuthConfig, AuthState, PasswordService, TokenService};
use crate::db::HospitalDb;
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(HospitalDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match HospitalDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match MIGRATOR.run(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // Clone and manage the database pool so guards and handlers can
        // reach it without going through the rocket_db_pools connection.
        .attach(AdHoc::try_on_ignite("Manage DB Pool", |rocket| async move {
            match HospitalDb::fetch(&rocket) {
                Some(db) => {
                    let pool = (**db).clone();
                    Ok(rocket.manage(pool))
                }
                None => Err(rocket),
            }
        }))
        // Build the auth core from environment configuration.
        .attach(AdHoc::try_on_ignite("Auth State", |rocket| async move {
            let config = match AuthConfig::from_env() {
                Ok(config) => config,
                Err(err) => {
                    log::error!("auth configuration invalid: {}", err);
                    return Err(rocket);
                }
            };

            let password_service = match PasswordService::new() {
                Ok(service) => service,
                Err(err) => {
                    log::error!("failed to initialize password hashing: {}", err);
                    return Err(rocket);
                }
            };

            let token_service = match TokenService::from_config(&config) {
                Ok(service) => service,
                Err(err) => {
                    log::error!("failed to initialize token service: {}", err);
                    return Err(rocket);
                }
            };

            let state = AuthState::new(config, password_service, token_service, Arc::new(LogMailer));
            Ok(rocket.manage(state))
        }))
        .mount(
            "/api",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Auth routes
                auth::routes::login,
                auth::routes::register,
                auth::routes::create_admin,
                auth::routes::validate,
                auth::routes::forgot_password,
                auth::routes::reset_password,
                // Admin routes
                routes::admin::list_users,
                routes::admin::get_user,
                routes::admin::update_user,
                routes::admin::deactivate_user,
                routes::admin::delete_user,
                // Doctor routes
                routes::doctor::list_patients,
                routes::doctor::list_appointments,
                routes::doctor::update_appointment_status,
                routes::doctor::create_prescription,
                routes::doctor::list_prescriptions,
                // Pharmacist routes
                routes::pharmacist::list_medicines,
                routes::pharmacist::create_medicine,
                routes::pharmacist::update_medicine,
                routes::pharmacist::delete_medicine,
                routes::pharmacist::list_prescriptions,
                routes::pharmacist::dispense_prescription,
                // Receptionist routes
                routes::receptionist::register_patient,
                routes::receptionist::list_patients,
                routes::receptionist::update_patient,
                routes::receptionist::book_appointment,
                routes::receptionist::cancel_appointment,
                routes::receptionist::create_billing,
                routes::receptionist::settle_billing,
                routes::receptionist::list_billings,
                routes::receptionist::list_rooms,
                routes::receptionist::list_beds,
                routes::receptionist::assign_bed,
                routes::receptionist::release_bed,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Hospital API", "../../openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::sync::Arc;

    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use sqlx::PgPool;

    use crate::auth::mailer::Mailer;
    use crate::auth::policy::Role;
    use crate::auth::{AuthConfig, AuthState, PasswordService, TokenService};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Auth configuration with fixed secrets for tests.
    pub fn test_auth_config() -> AuthConfig {
        AuthConfig {
            issuer: "https://hospital.test".into(),
            audience: "hospital-api".into(),
            token_ttl_secs: 3_600,
            reset_token_ttl_secs: 3_600,
            jwt_secret: "integration-test-secret".into(),
            frontend_url: "http://localhost:3000".into(),
        }
    }

    /// Build a complete [`AuthState`] around the given mailer.
    pub fn test_auth_state(mailer: Arc<dyn Mailer>) -> AuthState {
        let config = test_auth_config();
        let password_service = PasswordService::new().expect("password service");
        let token_service = TokenService::from_config(&config).expect("token service");
        AuthState::new(config, password_service, token_service, mailer)
    }

    /// Convenience helpers for seeding identities in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert an active staff account and return its numeric id.
        pub async fn create_user(
            &self,
            state: &AuthState,
            email: &str,
            password: &str,
            role: Role,
        ) -> i32 {
            let password_hash = state
                .password_service
                .hash_password(password)
                .expect("hash password");
            let user_id = crate::auth::store::mint_user_id(role);

            sqlx::query_scalar::<_, i32>(
                r#"
                INSERT INTO users (user_id, first_name, last_name, email, password_hash, role)
                VALUES ($1, 'Test', 'User', lower($2), $3, $4)
                RETURNING id
                "#,
            )
            .bind(&user_id)
            .bind(email)
            .bind(&password_hash)
            .bind(role.as_str())
            .fetch_one(self.pool)
            .await
            .expect("insert test user")
        }

        /// Insert a patient row and return its numeric id.
        pub async fn create_patient(&self, first_name: &str, last_name: &str) -> i32 {
            sqlx::query_scalar::<_, i32>(
                r#"
                INSERT INTO patients (patient_id, first_name, last_name)
                VALUES ($1, $2, $3)
                RETURNING id
                "#,
            )
            .bind(crate::routes::helpers::mint_entity_id("PAT"))
            .bind(first_name)
            .bind(last_name)
            .fetch_one(self.pool)
            .await
            .expect("insert test patient")
        }
    }

    mod database {
        use log::LevelFilter;
        use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use sqlx::{ConnectOptions, PgPool};
        use testcontainers::runners::AsyncRunner;
        use testcontainers::{ContainerAsync, TestcontainersError};
        use testcontainers_modules::postgres::Postgres;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        use crate::MIGRATOR;

        #[derive(Debug, thiserror::Error)]
        pub enum TestDatabaseError {
            #[error("TEST_DATABASE_URL is not set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migrate(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// An ephemeral Postgres database with migrations applied. Backed
        /// either by `TEST_DATABASE_URL` or by a throwaway container; the
        /// database is dropped when the value goes away.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Provision from `TEST_DATABASE_URL`. Returns
            /// [`TestDatabaseError::MissingUrl`] when unset so callers can
            /// skip rather than fail.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                let url =
                    std::env::var("TEST_DATABASE_URL").map_err(|_| TestDatabaseError::MissingUrl)?;
                Self::provision(&url, None).await
            }

            /// Provision against a fresh Postgres container.
            pub async fn new_container() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().start().await?;
                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
                Self::provision(&url, Some(container)).await
            }

            async fn provision(
                url: &str,
                container: Option<ContainerAsync<Postgres>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = url.parse().map_err(TestDatabaseError::Sqlx)?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container,
                })
            }

            /// Cloneable connection pool for use in tests and Rocket state.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Convenience method returning a clone of the pooled handle.
            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database(self.admin_options.clone(), &self.database_name).await?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database(admin_options, &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database(admin_options, &db_name).await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration
    /// tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        auth_state: Option<AuthState>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging off.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pg_pool: None,
                auth_state: None,
            }
        }

        /// Mount routes under `/api`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api".to_string(), routes));
            self
        }

        /// Manage a `PgPool` for tests that exercise database-backed routes.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Manage an [`AuthState`] for tests that exercise guarded routes.
        pub fn manage_auth_state(mut self, state: AuthState) -> Self {
            self.auth_state = Some(state);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            if let Some(state) = self.auth_state {
                rocket = rocket.manage(state);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}

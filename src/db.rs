use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("hospital_db")]
pub struct HospitalDb(sqlx::PgPool);

use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use hospital_api::auth::passwords::PasswordService;
use hospital_api::auth::policy::Role;
use hospital_api::auth::store::mint_user_id;

#[derive(Parser, Debug)]
#[command(name = "create_admin", about = "Create a hospital staff account")]
struct Args {
    /// Email address for the account (case insensitive).
    #[arg(long)]
    email: String,

    /// Plaintext password to hash and store for this account.
    #[arg(long)]
    password: String,

    /// First name.
    #[arg(long, default_value = "Admin")]
    first_name: String,

    /// Last name.
    #[arg(long, default_value = "User")]
    last_name: String,

    /// Role to assign (ADMIN, DOCTOR, PHARMACIST or RECEPTIONIST).
    #[arg(long, default_value = "ADMIN")]
    role: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = args.email.trim().to_lowercase();

    if !email.contains('@') {
        writeln!(io::stderr(), "error: email must contain '@'")?;
        std::process::exit(1);
    }

    let role = match Role::parse(args.role.trim().to_uppercase().as_str()) {
        Some(role) => role,
        None => {
            writeln!(
                io::stderr(),
                "error: unsupported role '{}'. Use ADMIN, DOCTOR, PHARMACIST or RECEPTIONIST.",
                args.role
            )?;
            std::process::exit(1);
        }
    };

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let existing =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE lower(email) = lower($1)")
            .bind(&email)
            .fetch_one(&pool)
            .await?;

    if existing > 0 {
        writeln!(
            io::stderr(),
            "error: a user with email '{email}' already exists."
        )?;
        std::process::exit(1);
    }

    let password_service = PasswordService::new()
        .map_err(|err| io::Error::other(format!("argon2 init failed: {err}")))?;
    let password_hash = password_service
        .hash_password(&args.password)
        .map_err(|err| io::Error::other(format!("password hash failed: {err}")))?;

    let external_id = mint_user_id(role);
    let id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO users (user_id, first_name, last_name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&external_id)
    .bind(&args.first_name)
    .bind(&args.last_name)
    .bind(&email)
    .bind(&password_hash)
    .bind(role.as_str())
    .fetch_one(&pool)
    .await?;

    println!(
        "Created {} account '{}' ({external_id}) with id {id}",
        role.as_str(),
        email
    );
    Ok(())
}

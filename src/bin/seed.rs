use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_storefront_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin123", "admin").await?;
    let seller_id = ensure_user(&pool, "seller@example.com", "seller123", "seller").await?;
    let user_id = ensure_user(&pool, "user@example.com", "user123", "user").await?;
    seed_products(&pool, seller_id).await?;

    println!("Seed completed. Admin: {admin_id}, Seller: {seller_id}, User: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .execute(pool)
        .await?;

    Ok(id)
}

async fn seed_products(pool: &sqlx::PgPool, seller_id: Uuid) -> anyhow::Result<()> {
    let samples: [(&str, i64, i32); 4] = [
        ("Espresso Beans 1kg", 2_499, 40),
        ("Pour-over Kettle", 8_900, 12),
        ("Ceramic Mug", 1_500, 60),
        ("Hand Grinder", 30_000, 8),
    ];

    for (name, price, stock) in samples {
        let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            continue;
        }
        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, description, price, stock, approved)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(name)
        .bind(format!("{name} from the seed catalog"))
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    Ok(())
}

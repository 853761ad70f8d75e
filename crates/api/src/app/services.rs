use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::OnceCell;

use postguard_auth::{Hs256JwtValidator, JwtClaims, PasswordHasher, User};
use postguard_infra::{AppConfig, Datastores, StoreError, db, fixtures};

use crate::app::errors::ApiError;

/// Shared state behind every handler.
pub struct AppServices {
    pub stores: Datastores,
    pub hasher: PasswordHasher,
    pub jwt: Arc<Hs256JwtValidator>,
    pub token_ttl: Duration,
    seed_on_first_request: bool,
    bootstrapped: OnceCell<()>,
}

/// A successful login: the minted token and the refreshed user.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: i64,
    pub user: User,
}

impl AppServices {
    /// Connect to the configured database and wire the datastores.
    ///
    /// When first-request seeding is disabled the schema is created here if
    /// the database is empty.
    pub async fn from_config(config: &AppConfig) -> Result<Arc<Self>, StoreError> {
        let pool = db::connect(&config.database_url).await?;
        if !config.seed_on_first_request && db::existing_tables(&pool).await?.is_empty() {
            db::create_all(&pool).await?;
        }

        Ok(Arc::new(Self {
            stores: Datastores::sqlite(pool),
            hasher: PasswordHasher::new(config.password_scheme),
            jwt: Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes())),
            token_ttl: config.token_ttl,
            seed_on_first_request: config.seed_on_first_request,
            bootstrapped: OnceCell::new(),
        }))
    }

    /// Reset and seed the database exactly once per instance.
    ///
    /// A failed attempt leaves the cell empty, so the next request retries.
    pub async fn ensure_bootstrapped(&self) -> Result<(), StoreError> {
        self.bootstrapped
            .get_or_try_init(|| async {
                if self.seed_on_first_request {
                    tracing::info!("seeding fixtures before first request");
                    fixtures::bootstrap(&self.stores, &self.hasher).await?;
                }
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }

    /// Check credentials, record the login and mint a bearer token.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, ApiError> {
        let invalid = || ApiError::unauthenticated("invalid email or password");

        let Some(mut user) = self.stores.users.find_user_by_email(email.trim()).await? else {
            tracing::info!(email, "login rejected: unknown user");
            return Err(invalid());
        };

        let matches = self
            .hasher
            .verify(password, &user.password)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        if !matches {
            tracing::info!(user_id = user.id.get(), "login rejected: bad password");
            return Err(invalid());
        }
        if !user.active {
            tracing::info!(user_id = user.id.get(), "login rejected: inactive user");
            return Err(ApiError::unauthenticated("account is inactive"));
        }

        let tracking = user.tracked_login(now, ip);
        self.stores.users.record_login(user.id, &tracking).await?;
        user.last_login_at = tracking.last_login_at;
        user.current_login_at = Some(tracking.current_login_at);
        user.last_login_ip = tracking.last_login_ip;
        user.current_login_ip = tracking.current_login_ip;
        user.login_count = tracking.login_count;

        let claims = JwtClaims::for_principal(&user.principal(), now, self.token_ttl)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let token = self
            .jwt
            .issue(&claims)
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        tracing::info!(user_id = user.id.get(), login_count = user.login_count, "login succeeded");
        Ok(LoginOutcome {
            token,
            expires_at: claims.exp,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postguard_auth::NewUser;
    use postguard_posts::NewPost;

    async fn services() -> Arc<AppServices> {
        AppServices::from_config(&AppConfig::for_tests()).await.unwrap()
    }

    #[tokio::test]
    async fn bootstrap_runs_once_per_instance() {
        let services = services().await;
        services.ensure_bootstrapped().await.unwrap();

        let matt = services
            .stores
            .users
            .find_user_by_email("matt@lp.com")
            .await
            .unwrap()
            .unwrap();
        services
            .stores
            .posts
            .create_post(NewPost::authored_by(matt.id, &matt.email))
            .await
            .unwrap();

        // A second call must not reset the database.
        services.ensure_bootstrapped().await.unwrap();
        assert_eq!(services.stores.posts.posts_by_author(matt.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_bootstrap_is_retried_on_the_next_call() {
        let services = services().await;
        let pool = &services.stores.pool;

        // DROP TABLE refuses to remove a view, so the reset fails.
        sqlx::query("CREATE VIEW posts AS SELECT 1 AS id")
            .execute(pool)
            .await
            .unwrap();
        assert!(services.ensure_bootstrapped().await.is_err());

        sqlx::query("DROP VIEW posts").execute(pool).await.unwrap();
        services.ensure_bootstrapped().await.unwrap();
        assert!(
            services
                .stores
                .users
                .find_user_by_email("joe@lp.com")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn without_seeding_the_schema_is_created_only_for_an_empty_database() {
        let path = std::env::temp_dir().join(format!(
            "postguard-{}-{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let config = AppConfig {
            database_url: format!("sqlite://{}", path.display()),
            seed_on_first_request: false,
            ..AppConfig::for_tests()
        };

        let first = AppServices::from_config(&config).await.unwrap();
        first.ensure_bootstrapped().await.unwrap();
        assert!(first.stores.users.find_user_by_email("matt@lp.com").await.unwrap().is_none());
        first
            .stores
            .users
            .create_user(NewUser::new("kept@lp.com", "plaintext$pw").unwrap())
            .await
            .unwrap();
        first.stores.pool.close().await;

        // Reopening an existing database neither recreates nor seeds it.
        let second = AppServices::from_config(&config).await.unwrap();
        second.ensure_bootstrapped().await.unwrap();
        assert!(second.stores.users.find_user_by_email("kept@lp.com").await.unwrap().is_some());
        assert!(second.stores.users.find_user_by_email("matt@lp.com").await.unwrap().is_none());
        second.stores.pool.close().await;

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn login_rejects_inactive_users_after_checking_the_password() {
        let services = services().await;
        services.ensure_bootstrapped().await.unwrap();
        let err = services
            .login("tiya@lp.com", "password", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(msg) if msg.contains("inactive")));
    }

    #[tokio::test]
    async fn overflowing_token_lifetime_fails_login_without_panicking() {
        let config = AppConfig {
            token_ttl: Duration::seconds(i64::MAX / 1000),
            ..AppConfig::for_tests()
        };
        let services = AppServices::from_config(&config).await.unwrap();
        services.ensure_bootstrapped().await.unwrap();

        let err = services
            .login("matt@lp.com", "password", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}

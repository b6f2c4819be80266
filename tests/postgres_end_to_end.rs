use anyhow::{Context, Result, ensure};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use folio::{
    api,
    auth::{
        AuthConfig, AuthState, CredentialVerifier, PgCredentials,
        credential::{HASH_LEN, generate_salt},
    },
};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{path::PathBuf, sync::Arc};
use test_support::{TestNetwork, postgres::{PostgresConfig, PostgresContainer}, runtime};
use tower::ServiceExt;

const USER: &str = "editor";
const PASSPHRASE: &str = "a long and memorable passphrase";
const ORIGIN: &str = "192.0.2.10";

struct TestContext {
    _postgres: PostgresContainer,
    pool: PgPool,
    app: Router,
}

impl TestContext {
    async fn new() -> Result<Self> {
        let network = TestNetwork::new("folio-it");
        let postgres = PostgresContainer::start_with_config(
            network.name(),
            PostgresConfig::new().with_db_name("folio"),
        )
        .await?;
        postgres.wait_until_ready().await?;

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&postgres.admin_dsn())
            .await
            .context("Failed to connect to test database")?;
        apply_schema(&pool).await?;
        provision_user(&pool, USER, PASSPHRASE).await?;

        let config = AuthConfig::new().with_trust_proxy_headers(true);
        let credentials = Arc::new(PgCredentials::new(pool.clone()));
        let state = Arc::new(AuthState::new(config, credentials));
        let app = api::app(state, pool.clone());

        Ok(Self {
            _postgres: postgres,
            pool,
            app,
        })
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", ORIGIN)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))?;
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    async fn login(&self) -> Result<String> {
        let body = json!({"userid": USER, "passphrase": PASSPHRASE, "period": "15m"});
        let (status, response) = self.send(Method::POST, "/login", Some(body)).await?;
        ensure!(status == StatusCode::OK, "login failed with {status}: {response}");
        response["secret"]
            .as_str()
            .map(str::to_string)
            .context("login response has no secret")
    }

    async fn count(&self, table: &str) -> Result<i64> {
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn apply_schema(pool: &PgPool) -> Result<()> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sql/schema.sql");
    let sql = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    sqlx::raw_sql(&sql)
        .execute(pool)
        .await
        .context("Failed to apply schema")?;
    Ok(())
}

async fn provision_user(pool: &PgPool, username: &str, passphrase: &str) -> Result<()> {
    let salt = generate_salt()?;
    let hash = CredentialVerifier::new().derive(passphrase, &salt, HASH_LEN)?;
    let user_id: i64 = sqlx::query_scalar("INSERT INTO users (username) VALUES ($1) RETURNING id")
        .bind(username)
        .fetch_one(pool)
        .await?;
    sqlx::query("INSERT INTO credentials (user_id, hash, salt) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(hash)
        .bind(salt.to_vec())
        .execute(pool)
        .await?;
    Ok(())
}

#[tokio::test]
async fn blog_lifecycle_against_postgres() -> Result<()> {
    if let Err(err) = runtime::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }
    let ctx = TestContext::new().await?;
    let secret = ctx.login().await?;

    let create = json!({
        "username": USER,
        "secret": secret,
        "data": {"title": "First", "subtitle": "Hello", "tag": "news", "body": "It works."}
    });
    let (status, created) = ctx.send(Method::POST, "/blog", Some(create)).await?;
    assert_eq!(status, StatusCode::OK, "{created}");
    let id = created["id"].as_str().context("created blog has no id")?.to_string();

    let (status, listed) = ctx.send(Method::GET, "/blogs", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["title"], "First");

    let update = json!({
        "username": USER,
        "secret": secret,
        "data": {"id": id, "title": "First, revised", "subtitle": "Hello", "tag": "news", "body": "Still works."}
    });
    let (status, updated) = ctx.send(Method::PUT, "/blog", Some(update)).await?;
    assert_eq!(status, StatusCode::OK, "{updated}");

    let (status, blog) = ctx.send(Method::GET, &format!("/blog?id={id}"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blog["title"], "First, revised");
    assert_eq!(blog["body"], "Still works.");

    let delete = json!({"username": USER, "secret": secret, "data": {"id": id}});
    let (status, _) = ctx.send(Method::DELETE, "/blog", Some(delete.clone())).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(ctx.count("blog_pages").await?, 0);
    assert_eq!(ctx.count("page_content").await?, 0);

    let (status, _) = ctx.send(Method::DELETE, "/blog", Some(delete)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx.send(Method::GET, &format!("/blog?id={id}"), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn duplicate_static_page_conflicts_without_orphans() -> Result<()> {
    if let Err(err) = runtime::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }
    let ctx = TestContext::new().await?;
    let secret = ctx.login().await?;

    let page = json!({"username": USER, "secret": secret, "data": {"name": "about", "body": "v1"}});
    let (status, created) = ctx.send(Method::POST, "/static", Some(page)).await?;
    assert_eq!(status, StatusCode::OK, "{created}");
    assert_eq!(created["name"], "about");

    let again = json!({"username": USER, "secret": secret, "data": {"name": "about", "body": "v2"}});
    let (status, _) = ctx.send(Method::POST, "/static", Some(again)).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(ctx.count("page_content").await?, 1);
    assert_eq!(ctx.count("static_pages").await?, 1);

    let (status, fetched) = ctx.send(Method::GET, "/static/about", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["body"], "v1");

    let (status, _) = ctx.send(Method::GET, "/static/missing", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn health_reports_database() -> Result<()> {
    if let Err(err) = runtime::ensure_container_runtime() {
        eprintln!("Skipping integration test: {err}");
        return Ok(());
    }
    let ctx = TestContext::new().await?;
    let (status, health) = ctx.send(Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["database"], "ok");
    assert_eq!(health["name"], "folio");
    Ok(())
}

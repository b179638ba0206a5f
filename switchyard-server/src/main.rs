//! Demo binary: a small user service served through switchyard.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use axum::{
    extract::{Path, Request},
    http::{header::LOCATION, HeaderValue},
    RequestExt,
};
use serde::{Deserialize, Serialize};
use switchyard_core::{Failure, Kind, Outcome, TypedError, UnclassifiedExt};
use switchyard_server::{Reply, Route, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

type Users = Arc<RwLock<BTreeMap<u64, User>>>;

async fn user_id(mut req: Request) -> Result<u64, Failure> {
    let Path(raw) = req
        .extract_parts::<Path<String>>()
        .await
        .map_err(|e| TypedError::new(Kind::Invalid, e.body_text()).with_code(400))?;
    raw.parse()
        .map_err(|_| TypedError::new(Kind::Invalid, "Invalid User ID").with_code(400).into())
}

fn list(users: &Users) -> Outcome<Vec<User>> {
    let guard = users.read().map_err(|e| Failure::unclassified(e.to_string()))?;
    Ok(guard.values().cloned().collect())
}

async fn get(users: Users, req: Request) -> Outcome<User> {
    let id = user_id(req).await?;
    let guard = users.read().map_err(|e| Failure::unclassified(e.to_string()))?;
    guard.get(&id).cloned().ok_or_else(|| {
        TypedError::new(Kind::NotExist, format!("no user {id}"))
            .with_code(404)
            .with_op("users.get")
            .into()
    })
}

async fn create(users: Users, req: Request, reply: Reply) -> Outcome<User> {
    let bytes = axum::body::to_bytes(req.into_body(), 64 * 1024).await.unclassified()?;
    let user: User = serde_json::from_slice(&bytes)
        .map_err(|e| TypedError::new(Kind::Encoding, e.to_string()).with_code(400))?;
    let mut guard = users.write().map_err(|e| Failure::unclassified(e.to_string()))?;
    if guard.contains_key(&user.id) {
        return Err(TypedError::new(Kind::Exist, format!("user {} exists", user.id))
            .with_code(409)
            .into());
    }
    guard.insert(user.id, user.clone());
    let location = HeaderValue::from_str(&format!("/api/users/{}", user.id)).unclassified()?;
    reply.insert_header(LOCATION, location);
    Ok(user)
}

async fn remove(users: Users, req: Request) -> Outcome<()> {
    let id = user_id(req).await?;
    let mut guard = users.write().map_err(|e| Failure::unclassified(e.to_string()))?;
    guard.remove(&id).map(|_| ()).ok_or_else(|| {
        TypedError::new(Kind::NotExist, format!("no user {id}")).with_code(404).into()
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config = ServerConfig::builder();
    if let Ok(port) = std::env::var("SWITCHYARD_PORT") {
        match port.parse() {
            Ok(p) => config = config.port(p),
            Err(e) => {
                tracing::error!(port = %port, error = %e, "invalid SWITCHYARD_PORT");
                std::process::exit(1);
            }
        }
    }

    let users: Users = Arc::new(RwLock::new(BTreeMap::from([(
        1,
        User { id: 1, name: "Hunter".to_owned() },
    )])));

    let (u1, u2, u3, u4) = (users.clone(), users.clone(), users.clone(), users);
    let server = Server::new("api", config.build()).add_routes([
        Route::get("/users", move |_req, _reply| {
            let users = u1.clone();
            async move { list(&users) }
        }),
        Route::get("/users/{id}", move |req, _reply| get(u2.clone(), req)),
        Route::post("/users", move |req, reply| create(u3.clone(), req, reply)),
        Route::delete("/users/{id}", move |req, _reply| remove(u4.clone(), req)),
        Route::get_fn("/health", |_req| async { "ok" }),
    ]);

    if let Err(e) = server.serve().await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

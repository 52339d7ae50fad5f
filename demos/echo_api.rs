//! Echo-style demo API — grouped routes, group middleware, JSON binding.
//!
//! Run with:
//!   cargo run --example echo_api
//!
//! Try:
//!   curl http://localhost:8080/hello/
//!   curl http://localhost:8080/hello/?name=World
//!   curl http://localhost:8080/hello/Taro
//!   curl -X POST http://localhost:8080/users/ \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice","email":"alice@example.com"}'
//!   curl http://localhost:8080/healthz

use http::header::{HeaderValue, SERVER};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;

use reverb::middleware::Trace;
use reverb::{health, Context, Flow, HttpError, Response, Router, RouterError, Server};

/// Process-wide settings, fixed at startup and read-only afterwards.
struct Config {
    listen: &'static str,
    log: tracing::Level,
}

#[derive(Debug, Deserialize, Serialize)]
struct User {
    name: String,
    email: String,
}

// GET /hello/ — greets by query parameter, falls back to a fixed greeting.
async fn hello(ctx: Context) -> Result<Response, HttpError> {
    let name = ctx.query("name");
    if name.is_empty() {
        Ok(Response::text("Hello, echo api server!"))
    } else {
        Ok(Response::text(format!("Hello, {name}")))
    }
}

// GET /hello/:name — greets by path parameter.
async fn hello_path(ctx: Context) -> Result<Response, HttpError> {
    let name = ctx.param("name");
    if name.is_empty() {
        return Err(HttpError::bad_request("name is missing"));
    }
    Response::json(&serde_json::json!({ "message": format!("Hello, {name}") }))
}

// POST /users/ — binds the JSON body and echoes the created record.
async fn create_user(ctx: Context) -> Result<Response, HttpError> {
    let user: User = ctx
        .bind()
        .map_err(|_| HttpError::bad_request("malformed request body"))?;

    // A real app would persist here.
    info!(name = %user.name, email = %user.email, "received new user");

    Response::builder().status(StatusCode::CREATED).json(&user)
}

// PUT /users/ — same binding; an update has nothing new to say, so 204.
async fn modify_user(ctx: Context) -> Result<Response, HttpError> {
    let user: User = ctx
        .bind()
        .map_err(|_| HttpError::bad_request("malformed request body"))?;

    info!(name = %user.name, email = %user.email, "updated user");

    Ok(Response::status(StatusCode::NO_CONTENT))
}

// Group middleware for /users: stamp a Server header onto the final
// response, whatever it turns out to be — the hook fires on error
// translations too.
async fn server_header(ctx: Context) -> Result<Flow, HttpError> {
    ctx.defer(|res| res.set_header(SERVER, HeaderValue::from_static("reverb/echo-api")));
    Ok(Flow::Continue(ctx))
}

fn app() -> Result<Router, RouterError> {
    let mut app = Router::new();
    app.with(Trace);

    let mut hello_group = app.group("/hello");
    hello_group.get("/", hello)?;
    hello_group.get("/:name", hello_path)?;

    let mut users = app.group("/users").with(server_header);
    users.post("/", create_user)?;
    users.put("/", modify_user)?;

    app.get("/healthz", health::liveness)?;
    app.get("/readyz", health::readiness)?;

    Ok(app)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config { listen: "0.0.0.0:8080", log: tracing::Level::DEBUG };
    tracing_subscriber::fmt().with_max_level(config.log).init();

    Server::bind(config.listen).serve(app()?).await?;
    Ok(())
}

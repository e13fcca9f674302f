//! Minimal lambstack example: a users resource behind CORS, security headers
//! and request validation, invoked with a host-shaped JSON event.
//!
//! Run with:
//!   LOG_LEVEL=debug cargo run --example basic
//!   LOG_FORMAT=json cargo run --example basic

use lambstack::config::Config;
use lambstack::dispatch::{self, Methods};
use lambstack::middleware::{CorsConfig, cors, helmet, validate};
use lambstack::{Context, Event, HttpError, Patch, Stack, Step, logging, redirect};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(&Config::from_env())?;

    let stack = Stack::new(vec![
        cors(serde_json::from_value::<CorsConfig>(json!({
            "allowOrigin": ["https://app.example.com"],
            "allowMethods": ["GET", "POST"],
            "maxAge": 600
        }))?),
        helmet(),
        // Old clients still hit /v1.
        Step::from_fn(|ev, _, _| Ok(ev.path.starts_with("/v1/").then(|| redirect(301, &ev.path[3..])))),
        dispatch::main(
            Methods::new()
                .get(|ev, _| {
                    let id = ev.query_string_parameters.get("id").ok_or_else(|| HttpError::bad_request("missing `id`"))?;
                    Ok(json!({ "id": id, "name": "alice" }))
                })
                .post(|ev, _| {
                    let user = ev.json.clone().unwrap_or_default();
                    Ok(Patch::new().status(201).header("location", "/users/99").json(user))
                }),
        ),
    ])
    .on_error(vec![Step::from_fn(|_, ctx, res| {
        res.set_header("x-request-id", ctx.request_id.clone());
        Ok(())
    })]);

    // A separate function that validates before creating.
    let create = Stack::new(vec![
        validate::request(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        })),
        dispatch::main(Methods::new().post(|ev, _| Ok(Patch::new().status(201).json(ev.json.clone().unwrap_or_default())))),
    ]);

    let events = [
        json!({
            "httpMethod": "GET",
            "path": "/users",
            "headers": { "Origin": "https://app.example.com" },
            "queryStringParameters": { "id": "42" }
        }),
        json!({
            "httpMethod": "GET",
            "path": "/users",
            "headers": { "Accept": "application/json" }
        }),
        json!({
            "httpMethod": "DELETE",
            "path": "/users"
        }),
        json!({
            "httpMethod": "GET",
            "path": "/v1/users"
        }),
    ];

    for raw in events {
        let event: Event = serde_json::from_value(raw)?;
        let out = stack.run(event, Context::new("demo")).await;
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    let event = Event::new("POST", "/users")
        .with_header("Content-Type", "application/json")
        .with_body(r#"{"name": 7}"#);
    let out = create.run(event, Context::new("demo-create")).await;
    println!("{}", serde_json::to_string_pretty(&out)?);

    Ok(())
}

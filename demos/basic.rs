use radix_dispatch::{Engine, HttpMethod, Outcome, RoutePattern, Target};
use serde_json::Value;

fn describe(outcome: &Outcome<'_, Value>) {
    match &outcome.target {
        Target::Route(handler) => {
            println!("   ✓ Matched! ({})", outcome.status);
            println!("   Handler: {}", handler);
            println!("   Matched params: {}", serde_json::to_string(&outcome.params).unwrap_or_default());
        }
        Target::Redirect(location) => {
            println!("   → Redirect {} to {}", outcome.status, location);
        }
        Target::Status(handler) => {
            println!("   ✗ {} handled by {}", outcome.status, handler);
        }
        Target::Default => {
            println!("   ✗ {}", outcome.default_body());
            if let Some(allow) = outcome.allow_header() {
                println!("   Allow: {}", allow);
            }
        }
    }
    println!();
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut builder = Engine::builder();
    builder.handle(
        "GET",
        "/api/users",
        serde_json::json!({"handler": "get_users", "upstream": "user-service:8001"}),
    )?;
    builder.handle_methods(
        HttpMethod::GET | HttpMethod::PUT | HttpMethod::DELETE,
        "/api/user/:id",
        serde_json::json!({"handler": "user_detail", "upstream": "user-service:8001"}),
    )?;
    builder.handle(
        "GET",
        "/api/user/:id/posts",
        serde_json::json!({"handler": "user_posts", "upstream": "post-service:8002"}),
    )?;
    builder.handle(
        "GET",
        "/admin/*path",
        serde_json::json!({"handler": "admin", "upstream": "admin-service:8003"}),
    )?;
    builder.handle("GET", "/Docs/Index", serde_json::json!({"handler": "docs"}))?;
    builder.status(404, serde_json::json!({"handler": "not_found_page"}))?;
    let engine = builder.build();

    println!("=== Radix Dispatch Examples ===\n");

    let cases = [
        ("1. Exact path match", "GET", "/api/users"),
        ("2. Parameter extraction", "GET", "/api/user/12345"),
        ("3. Parameter plus static suffix", "GET", "/api/user/12345/posts"),
        ("4. Catch-all", "GET", "/admin/dashboard/settings"),
        ("5. Multiple methods allowed", "PUT", "/api/user/12345"),
        ("6. Trailing slash redirect", "GET", "/api/users/"),
        ("7. Case-insensitive redirect", "GET", "/docs/index"),
        ("8. Method not allowed", "POST", "/api/users"),
        ("9. Not found", "GET", "/nothing/here"),
    ];

    for (title, method, path) in cases {
        println!("{}:", title);
        println!("   Path: {}", path);
        println!("   Method: {}", method);
        describe(&engine.resolve(method, path));
    }

    println!("=== Reverse routing ===");
    let route = RoutePattern::new("GET", "/api/user/:id/posts")?;
    let url = route.url(&["42"]);
    println!("   {} ({}) -> {}", route.pattern(), route.name(), url);
    assert_eq!(engine.resolve("GET", &url).param("id"), "42");

    println!("\nRegistered methods: {:?}", engine.methods());

    Ok(())
}

/// Edge cases and boundary conditions
/// Exercises registration errors, redirects and status handling at their limits
use radix_dispatch::{Engine, EngineConfig, RouteError, Target, STATUS};

fn main() -> anyhow::Result<()> {
    println!("=== Edge Cases & Boundary Conditions Test ===\n");

    // Test 1: Root and catch-all at the root
    println!("Test 1: Root paths");
    {
        let mut builder = Engine::builder();
        builder.handle("GET", "/", "root")?;
        builder.handle("GET", "/api", "api")?;
        let engine = builder.build();

        assert_eq!(engine.resolve("GET", "/").handler(), Some(&"root"));
        println!("  ✓ Root path '/' matched");
        assert_eq!(engine.resolve("GET", "/api").handler(), Some(&"api"));
        println!("  ✓ Path '/api' matched");

        let mut builder = Engine::builder();
        builder.handle("GET", "/*all", "everything")?;
        let engine = builder.build();
        let outcome = engine.resolve("GET", "/");
        assert_eq!(outcome.handler(), Some(&"everything"));
        assert_eq!(outcome.param("all"), "");
        println!("  ✓ '/*all' matches '/' with an empty value");
    }

    // Test 2: Special characters
    println!("\nTest 2: Paths with special characters");
    {
        let mut builder = Engine::builder();
        builder.handle("GET", "/api/user-profile", "dash")?;
        builder.handle("GET", "/api/user_settings", "underscore")?;
        builder.handle("GET", "/api/v1.0/users", "dot")?;
        builder.handle("GET", "/search/:query", "search")?;
        let engine = builder.build();

        for (path, handler) in [
            ("/api/user-profile", "dash"),
            ("/api/user_settings", "underscore"),
            ("/api/v1.0/users", "dot"),
        ] {
            assert_eq!(engine.resolve("GET", path).handler(), Some(&handler));
            println!("  ✓ {} matched", path);
        }

        let outcome = engine.resolve("GET", "/search/someth!ng+in+ünìcodé");
        assert_eq!(outcome.param("query"), "someth!ng+in+ünìcodé");
        println!("  ✓ Unicode parameter captured verbatim");
    }

    // Test 3: Similar paths
    println!("\nTest 3: Similar paths (prefix splitting)");
    {
        let mut builder = Engine::builder();
        for path in ["/api", "/api/users", "/api/user", "/api/user/:id", "/api/user/new"] {
            builder.handle("GET", path, path)?;
        }
        let engine = builder.build();

        for (path, expected) in [
            ("/api", "/api"),
            ("/api/users", "/api/users"),
            ("/api/user", "/api/user"),
            ("/api/user/new", "/api/user/new"),
            ("/api/user/7", "/api/user/:id"),
            ("/api/user/newer", "/api/user/:id"),
        ] {
            assert_eq!(engine.resolve("GET", path).handler(), Some(&expected));
            println!("  ✓ {} -> {}", path, expected);
        }
    }

    // Test 4: Registration errors
    println!("\nTest 4: Registration errors");
    {
        let mut builder = Engine::builder();
        builder.handle("GET", "/src/*filepath", ())?;
        builder.handle("GET", "/item/:id", ())?;

        let cases = [
            ("/item/:id", "duplicate"),
            ("/item/:name", "wildcard conflict"),
            ("/src/main.rs", "catch-all conflict"),
            ("/user/:", "unnamed wildcard"),
            ("/user/:a:b", "two wildcards in one segment"),
            ("/files/*path/edit", "catch-all not last"),
            ("/files*path", "catch-all without slash"),
            ("relative", "missing leading slash"),
        ];
        for (path, what) in cases {
            let err = builder
                .handle("GET", path, ())
                .expect_err("registration should fail");
            let kind = err.downcast_ref::<RouteError>();
            assert!(kind.is_some());
            println!("  ✓ {} rejected ({}): {}", path, what, err.root_cause());
        }
    }

    // Test 5: Trailing slashes
    println!("\nTest 5: Trailing slashes");
    {
        let mut builder = Engine::builder();
        builder.handle("GET", "/users", "users")?;
        builder.handle("GET", "/posts/", "posts")?;
        builder.handle("POST", "/posts/", "create")?;
        let engine = builder.build();

        let outcome = engine.resolve("GET", "/users/");
        assert_eq!((outcome.status, outcome.location()), (301, Some("/users")));
        println!("  ✓ GET /users/ -> 301 /users");

        let outcome = engine.resolve("GET", "/posts");
        assert_eq!((outcome.status, outcome.location()), (301, Some("/posts/")));
        println!("  ✓ GET /posts -> 301 /posts/");

        let outcome = engine.resolve("POST", "/posts");
        assert_eq!((outcome.status, outcome.location()), (307, Some("/posts/")));
        println!("  ✓ POST /posts -> 307 /posts/");

        let mut builder = Engine::builder().with_config(EngineConfig {
            redirect_trailing_slash: false,
            redirect_fixed_path: false,
        });
        builder.handle("GET", "/users", "users")?;
        let engine = builder.build();
        let outcome = engine.resolve("GET", "/users/");
        assert_eq!(outcome.status, 404);
        assert!(outcome.tsr);
        println!("  ✓ Redirects disabled -> 404 (tsr still reported)");
    }

    // Test 6: Case sensitivity
    println!("\nTest 6: Case sensitivity");
    {
        let mut builder = Engine::builder();
        builder.handle("GET", "/API/Users", "users")?;
        let engine = builder.build();

        assert_eq!(engine.resolve("GET", "/API/Users").status, 200);
        println!("  ✓ Exact case matched");

        let outcome = engine.resolve("GET", "/api/users");
        assert_eq!(outcome.location(), Some("/API/Users"));
        println!("  ✓ /api/users -> 301 /API/Users");

        let outcome = engine.resolve("GET", "/api/./users/../users/");
        assert_eq!(outcome.location(), Some("/API/Users"));
        println!("  ✓ Dirty path cleaned before correction");
    }

    // Test 7: Empty engine
    println!("\nTest 7: Empty engine");
    {
        let engine: Engine<()> = Engine::builder().build();
        let outcome = engine.resolve("GET", "/anything");
        assert_eq!(outcome.status, 404);
        assert_eq!(outcome.target, Target::Default);
        println!("  ✓ {}", outcome.default_body());
    }

    // Test 8: CONNECT and root never redirect
    println!("\nTest 8: Redirect exclusions");
    {
        let mut builder = Engine::builder();
        builder.handle("CONNECT", "/proxy/", "proxy")?;
        let engine = builder.build();
        let outcome = engine.resolve("CONNECT", "/proxy");
        assert_eq!(outcome.status, 404);
        println!("  ✓ CONNECT /proxy -> 404, no redirect");
    }

    // Test 9: Status handlers
    println!("\nTest 9: Status handlers");
    {
        let mut builder = Engine::builder();
        builder.handle("DELETE", "/admin/users/:id", "delete")?;
        builder.handle(STATUS, "/405/admin/*path", "admin 405")?;
        builder.handle(STATUS, "DEFAULT", "fallback")?;
        let engine = builder.build();

        let outcome = engine.resolve("GET", "/admin/users/1");
        assert_eq!(outcome.target, Target::Status(&"admin 405"));
        println!("  ✓ 405 handled by scoped handler, Allow: {:?}", outcome.allow_header());

        let outcome = engine.resolve("GET", "/elsewhere");
        assert_eq!(outcome.target, Target::Status(&"fallback"));
        println!("  ✓ 404 handled by default handler");
    }

    // Test 10: Nested parameters
    println!("\nTest 10: Nested parameters");
    {
        let mut builder = Engine::builder();
        builder.handle("GET", "/org/:org/team/:team/member/:member", "member")?;
        builder.handle("GET", "/org/:org/files/*path", "files")?;
        let engine = builder.build();

        let outcome = engine.resolve("GET", "/org/acme/team/core/member/alice");
        assert_eq!(outcome.param("org"), "acme");
        assert_eq!(outcome.param("team"), "core");
        assert_eq!(outcome.param("member"), "alice");
        println!("  ✓ Three parameters captured in order: {:?}", outcome.params.to_map());

        let outcome = engine.resolve("GET", "/org/acme/files/a/b/c.txt");
        assert_eq!(outcome.param("path"), "a/b/c.txt");
        println!("  ✓ Catch-all after a parameter: {}", outcome.param("path"));
    }

    println!("\n=== All edge cases passed ===");
    Ok(())
}

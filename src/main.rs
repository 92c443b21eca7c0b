pub mod analytics;
pub mod db;
pub mod discounts;
pub mod error;
pub mod models;
pub mod notifier;
pub mod orders;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;
use validator::Validate;

use discounts::scheduler::DiscountSweeper;
use discounts::service::DiscountService;
use error::ApiError;
use models::{CreateProduct, Product};
use notifier::LogNotifier;
use orders::lifecycle::OrderLifecycle;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        create_product,
        get_all_products,
        get_product_by_id,
        delete_product,
    ),
    components(
        schemas(Product, CreateProduct)
    ),
    tags(
        (name = "products", description = "Product catalog endpoints")
    ),
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = "Order lifecycle, inventory, and discount management API"
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub orders: OrderLifecycle,
    pub discounts: DiscountService,
    /// Shared with the background sweeper so the manual sweep endpoint and
    /// the scheduled loop never run at the same time
    pub sweep_guard: Arc<tokio::sync::Mutex<()>>,
}

/// Handler for POST /api/products
/// Creates a new catalog product
#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created successfully", body = Product),
        (status = 400, description = "Invalid input data", body = String, example = json!({"error": "Stock must be non-negative"})),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Database error"}))
    ),
    tag = "products"
)]
async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    tracing::debug!("Creating new product: {}", payload.name);

    // Validate the request using validator crate
    payload.validate()?;

    if payload.regular_price < rust_decimal::Decimal::ZERO {
        return Err(ApiError::Conflict {
            message: "Regular price must be non-negative".to_string(),
        });
    }

    // A new product has no discounts attached, so final_price starts at
    // regular_price
    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (name, category, regular_price, final_price, stock, is_published)
        VALUES ($1, $2, $3, $3, $4, $5)
        RETURNING id, name, category, regular_price, final_price, stock, sales_count,
                  total_revenue, is_published, is_archived, created_at, updated_at
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.category)
    .bind(payload.regular_price)
    .bind(payload.stock)
    .bind(payload.is_published)
    .fetch_one(&state.db)
    .await?;

    tracing::info!("Successfully created product with id: {}", product.id);
    Ok((StatusCode::CREATED, Json(product)))
}

/// Handler for GET /api/products
/// Retrieves all non-archived products
#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "List of all products", body = Vec<Product>),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Database error"}))
    ),
    tag = "products"
)]
async fn get_all_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    tracing::debug!("Fetching all products");

    let products = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, category, regular_price, final_price, stock, sales_count,
               total_revenue, is_published, is_archived, created_at, updated_at
        FROM products
        WHERE NOT is_archived
        ORDER BY id
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    tracing::debug!("Retrieved {} products", products.len());
    Ok(Json(products))
}

/// Handler for GET /api/products/:id
/// Retrieves a specific product by ID
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 404, description = "Product not found", body = String, example = json!({"error": "Product not found"})),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Database error"}))
    ),
    tag = "products"
)]
async fn get_product_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    tracing::debug!("Fetching product with id: {}", id);

    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, category, regular_price, final_price, stock, sales_count,
               total_revenue, is_published, is_archived, created_at, updated_at
        FROM products
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| {
        tracing::debug!("Product with id {} not found", id);
        ApiError::NotFound {
            resource: "Product".to_string(),
            id: id.to_string(),
        }
    })?;

    Ok(Json(product))
}

/// Handler for DELETE /api/products/:id
/// Archives a product. Order items keep their snapshots, so archived
/// products never break existing orders.
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 204, description = "Product archived successfully"),
        (status = 404, description = "Product not found", body = String, example = json!({"error": "Product not found"})),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Database error"}))
    ),
    tag = "products"
)]
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    tracing::debug!("Archiving product with id: {}", id);

    let result = sqlx::query(
        "UPDATE products SET is_archived = TRUE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound {
            resource: "Product".to_string(),
            id: id.to_string(),
        });
    }

    tracing::info!("Successfully archived product with id: {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
pub fn create_router(db: PgPool, sweep_guard: Arc<tokio::sync::Mutex<()>>) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let state = AppState {
        orders: OrderLifecycle::new(db.clone(), Arc::new(LogNotifier)),
        discounts: DiscountService::new(db.clone()),
        sweep_guard,
        db,
    };

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Catalog routes
        .route("/api/products", post(create_product))
        .route("/api/products", get(get_all_products))
        .route("/api/products/:id", get(get_product_by_id))
        .route("/api/products/:id", delete(delete_product))
        // Order routes
        .route("/api/orders", post(orders::create_order_handler))
        .route("/api/orders", get(orders::list_orders_handler))
        .route("/api/orders/:id", get(orders::get_order_handler))
        .route(
            "/api/orders/:id/transition",
            post(orders::transition_order_handler),
        )
        .route("/api/payments/confirm", post(orders::confirm_payment_handler))
        // Analytics routes
        .route(
            "/api/analytics/categories",
            get(analytics::category_performance_handler),
        )
        .route(
            "/api/analytics/top-products",
            get(analytics::top_products_handler),
        )
        .route(
            "/api/analytics/recompute",
            post(analytics::recompute_handler),
        )
        // Discount routes
        .route("/api/discounts", post(discounts::create_discount_handler))
        .route("/api/discounts", get(discounts::list_discounts_handler))
        .route("/api/discounts/sweep", post(discounts::sweep_handler))
        .route("/api/discounts/:id", get(discounts::get_discount_handler))
        .route("/api/discounts/:id", put(discounts::update_discount_handler))
        .route(
            "/api/discounts/:id",
            delete(discounts::delete_discount_handler),
        )
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging; RUST_LOG controls the
    // filter, defaulting to info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Storefront API - Starting...");

    // Get configuration from environment variables
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let sweep_secs: u64 = std::env::var("DISCOUNT_SWEEP_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Start the discount sweeper in the background
    let sweep_guard = Arc::new(tokio::sync::Mutex::new(()));
    let sweeper = DiscountSweeper::new(
        DiscountService::new(db_pool.clone()),
        Duration::from_secs(sweep_secs),
        sweep_guard.clone(),
    );
    tokio::spawn(sweeper.run());

    // Create the application router
    let app = create_router(db_pool, sweep_guard);

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Storefront API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}

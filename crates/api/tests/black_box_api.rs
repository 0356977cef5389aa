use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use storefront_api::app::{
    build_app,
    services::{ApiSettings, AppServices},
};
use storefront_auth::{JwtClaims, Role};
use storefront_core::UserId;
use storefront_infra::event_store::InMemoryEventStore;
use storefront_infra::external::{
    GatewayError, InitializeTransaction, InitializedTransaction, PaymentGateway, VerifiedTransaction,
};
use storefront_products::{PaymentReference, PaymentStatus};

const JWT_SECRET: &str = "test-secret";
const PASSWORD: &str = "Str0ng!Passw0rd";

/// Gateway double: every transaction initializes and verifies as `success`.
struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn initialize(&self, request: InitializeTransaction) -> Result<InitializedTransaction, GatewayError> {
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.test/{}", request.reference.as_str()),
            access_code: "access-code".to_string(),
            reference: request.reference.as_str().to_string(),
        })
    }

    async fn verify(&self, reference: &PaymentReference) -> Result<VerifiedTransaction, GatewayError> {
        Ok(VerifiedTransaction {
            reference: reference.as_str().to_string(),
            gateway_status: "success".to_string(),
            status: PaymentStatus::from_gateway("success"),
            amount: None,
        })
    }
}

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let settings = ApiSettings {
            allow_privileged_signup: true,
            paystack_callback_url: None,
        };
        let (services, _worker) = AppServices::build(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(StubGateway),
            JWT_SECRET,
            settings,
        )
        .await
        .expect("services");
        let app = build_app(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    /// Sign up and return the session token.
    async fn signup(&self, name: &str, email: &str, role: &str) -> String {
        let (status, body) = self
            .post(
                "/api/user/signup",
                None,
                json!({ "name": name, "email": email, "password": PASSWORD, "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "signup failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_product(&self, admin: &str, name: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/products",
                Some(admin),
                json!({
                    "name": name,
                    "description": "A sturdy item",
                    "price": 50,
                    "category": "tools",
                    "brand": "Acme",
                    "stock": 10,
                    "images": ["https://img.test/1.png"],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create product failed: {body}");
        body
    }

    async fn create_order(&self, token: &str, product_id: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/orders",
                Some(token),
                json!({ "products": [{ "product": product_id, "quantity": 2 }], "totalAmount": 100 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create order failed: {body}");
        body
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, sub: UserId, role: Role) -> String {
    let claims = JwtClaims::new(sub, role, Utc::now());
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("/api/user/protected", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authorization token required");

    let forged = mint_jwt("other-secret", UserId::new(), Role::ADMIN);
    let (status, body) = srv.get("/api/user/protected", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Request is not authorized");

    // Signed correctly, but nobody signed up with that id.
    let orphan = mint_jwt(JWT_SECRET, UserId::new(), Role::ADMIN);
    let (status, _) = srv.get("/api/user/protected", Some(&orphan)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_then_login_yields_a_working_token() {
    let srv = TestServer::spawn().await;
    srv.signup("Ada", "ada@example.com", "user").await;

    let (status, body) = srv
        .post("/api/user/login", None, json!({ "email": "ada@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, body) = srv.get("/api/user/protected", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["role"], "user");

    let (status, _) = srv.get("/api/user/admin-only", Some(token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signup_rejects_duplicates_and_weak_passwords() {
    let srv = TestServer::spawn().await;
    srv.signup("Ada", "ada@example.com", "user").await;

    let (status, body) = srv
        .post(
            "/api/user/signup",
            None,
            json!({ "name": "Ada", "email": "ADA@example.com", "password": PASSWORD, "role": "user" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already in use");

    let (status, _) = srv
        .post(
            "/api/user/signup",
            None,
            json!({ "name": "Bob", "email": "bob@example.com", "password": "password", "role": "user" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = srv
        .post("/api/user/login", None, json!({ "email": "ada@example.com", "password": "Wr0ng!Password" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Incorrect Password");
}

#[tokio::test]
async fn shoppers_cannot_manage_the_catalog() {
    let srv = TestServer::spawn().await;
    let shopper = srv.signup("Sam", "sam@example.com", "user").await;

    let (status, _) = srv
        .post("/api/products", Some(&shopper), json!({ "name": "Hammer" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_product_fields_are_reported_together() {
    let srv = TestServer::spawn().await;
    let admin = srv.signup("Root", "root@example.com", "admin").await;

    let (status, body) = srv
        .post("/api/products", Some(&admin), json!({ "name": "Hammer", "brand": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = body["emptyFields"].as_array().unwrap();
    for field in ["description", "price", "category", "stock", "images"] {
        assert!(fields.iter().any(|f| f == field), "{field} not reported in {body}");
    }
}

#[tokio::test]
async fn reviews_average_and_reject_repeats() {
    let srv = TestServer::spawn().await;
    let admin = srv.signup("Root", "root@example.com", "admin").await;
    let product = srv.create_product(&admin, "Claw Hammer").await;
    let id = product["id"].as_str().unwrap();
    assert_eq!(product["slug"], "claw-hammer");

    let mut reviewers = Vec::new();
    for (i, rating) in [4.0, 5.0, 3.0].into_iter().enumerate() {
        let token = srv
            .signup(&format!("Reviewer {i}"), &format!("r{i}@example.com"), "user")
            .await;
        let (status, body) = srv
            .post(
                &format!("/api/products/{id}/reviews"),
                Some(&token),
                json!({ "comment": "ok", "rating": rating }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "review failed: {body}");
        reviewers.push(token);
    }

    let (status, body) = srv.get("/api/products/claw-hammer", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 4.0);
    assert_eq!(body["numReviews"], 3);

    let (status, body) = srv
        .post(
            &format!("/api/products/{id}/reviews"),
            Some(&reviewers[0]),
            json!({ "comment": "again", "rating": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have already reviewed this product");

    let (status, _) = srv
        .post(
            &format!("/api/products/{id}/reviews"),
            Some(&reviewers[1]),
            json!({ "comment": "too much", "rating": 5.1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = srv.get(&format!("/api/products/{id}/reviews"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(body[0]["user"]["email"], "r0@example.com");
}

#[tokio::test]
async fn search_without_matches_is_not_found() {
    let srv = TestServer::spawn().await;
    let admin = srv.signup("Root", "root@example.com", "admin").await;
    srv.create_product(&admin, "Claw Hammer").await;

    let (status, body) = srv.get("/api/products/search?query=ACME", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = srv.get("/api/products/search?query=saw", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No products found!");
}

#[tokio::test]
async fn favourites_are_a_set() {
    let srv = TestServer::spawn().await;
    let admin = srv.signup("Root", "root@example.com", "admin").await;
    let shopper = srv.signup("Sam", "sam@example.com", "user").await;
    let product = srv.create_product(&admin, "Claw Hammer").await;
    let id = product["id"].as_str().unwrap();

    for _ in 0..2 {
        let (status, body) = srv
            .post("/api/products/favourites", Some(&shopper), json!({ "productId": id }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Added to favourites");
        assert_eq!(body["product"]["favourites"].as_array().unwrap().len(), 1);
    }

    let (status, body) = srv.get("/api/products/favourites", Some(&shopper)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn checkout_then_verify_settles_every_product() {
    let srv = TestServer::spawn().await;
    let admin = srv.signup("Root", "root@example.com", "admin").await;
    let shopper = srv.signup("Sam", "sam@example.com", "user").await;
    let p1 = srv.create_product(&admin, "Claw Hammer").await;
    let p2 = srv.create_product(&admin, "Tape Measure").await;

    let (status, body) = srv
        .post(
            "/api/products/checkout",
            Some(&shopper),
            json!({ "cartItems": [p1["id"], p2["id"]], "totalAmount": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {body}");
    let reference = body["reference"].as_str().unwrap().to_string();
    assert!(body["paymentUrl"].as_str().unwrap().ends_with(&reference));

    let (_, product) = srv.get("/api/products/claw-hammer", None).await;
    assert_eq!(product["payments"][0]["status"], "pending");

    let (status, body) = srv
        .get(&format!("/api/products/verify-payment?reference={reference}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    for slug in ["claw-hammer", "tape-measure"] {
        let (_, product) = srv.get(&format!("/api/products/{slug}"), None).await;
        let payments = product["payments"].as_array().unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0]["reference"], reference.as_str());
        assert_eq!(payments[0]["status"], "success");
        assert_eq!(payments[0]["amount"], 100);
    }
}

#[tokio::test]
async fn vehicles_can_only_be_changed_by_their_owner() {
    let srv = TestServer::spawn().await;
    let owner = srv.signup("Olu", "olu@example.com", "user").await;
    let other = srv.signup("Tayo", "tayo@example.com", "user").await;

    let (status, vehicle) = srv
        .post(
            "/api/vehicles",
            Some(&owner),
            json!({
                "make": "Toyota",
                "model": "Corolla",
                "year": 2018,
                "price": 9000,
                "mileage": 40000,
                "condition": "foreign",
                "availability": "available",
                "engineType": "1.8L",
                "transmission": "automatic",
                "fuelType": "petrol",
                "exteriorColor": "Silver",
                "interiorColor": "Black",
                "interiorMaterial": "fabric",
                "quantity": 1,
                "location": "Lagos",
                "images": ["https://img.test/car.png"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create vehicle failed: {vehicle}");
    let id = vehicle["id"].as_str().unwrap();

    let res = srv
        .client
        .patch(srv.url(&format!("/api/vehicles/{id}")))
        .bearer_auth(&other)
        .json(&json!({ "price": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let (status, body) = srv.get("/api/vehicles?make=Toyota&color=Silver", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = srv.get("/api/vehicle/search?query=coro", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn tracking_updates_append_history() {
    let srv = TestServer::spawn().await;
    let admin = srv.signup("Root", "root@example.com", "admin").await;
    let product = srv.create_product(&admin, "Claw Hammer").await;
    let order = srv.create_order(&admin, product["id"].as_str().unwrap()).await;
    let order_id = order["id"].as_str().unwrap();
    assert_eq!(order["products"][0]["product"]["name"], "Claw Hammer");

    let (status, _) = srv.get(&format!("/api/tracking/{order_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = srv
        .post("/api/tracking", Some(&admin), json!({ "order": order_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "create tracking failed: {body}");
    assert_eq!(body["status"], "Pending");

    let (status, _) = srv
        .post("/api/tracking", Some(&admin), json!({ "order": order_id }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    for next in ["Processing", "shipped"] {
        let (status, _) = srv
            .put(&format!("/api/tracking/{order_id}"), &admin, json!({ "status": next }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, history) = srv.get(&format!("/api/tracking/{order_id}/history"), None).await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["Processing", "Shipped"]);
}

#[tokio::test]
async fn invoice_numbers_are_unique() {
    let srv = TestServer::spawn().await;
    let admin = srv.signup("Root", "root@example.com", "admin").await;
    let product = srv.create_product(&admin, "Claw Hammer").await;
    let order = srv.create_order(&admin, product["id"].as_str().unwrap()).await;
    let body = json!({ "orderId": order["id"], "invoiceNumber": "INV-001", "amount": 100 });

    let (status, invoice) = srv.post("/api/invoices", Some(&admin), body.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "create invoice failed: {invoice}");
    assert_eq!(invoice["status"], "Unpaid");
    assert_eq!(invoice["order"]["id"], order["id"]);

    let (status, err) = srv.post("/api/invoices", Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["message"], "Invoice number already exists");

    let id = invoice["id"].as_str().unwrap();
    let (status, updated) = srv
        .put(&format!("/api/invoices/{id}"), &admin, json!({ "status": "paid" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "Paid");
}

#[tokio::test]
async fn sales_summaries_group_by_period() {
    let srv = TestServer::spawn().await;
    let admin = srv.signup("Root", "root@example.com", "admin").await;

    let (status, body) = srv.get("/api/sales/total", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "totalSales": 0, "count": 0 }));

    let product = srv.create_product(&admin, "Claw Hammer").await;
    let order = srv.create_order(&admin, product["id"].as_str().unwrap()).await;
    for (amount, date) in [
        (30, "2024-03-02T10:00:00Z"),
        (20, "2024-03-01T09:00:00Z"),
        (50, "2024-03-01T18:30:00Z"),
    ] {
        let (status, _) = srv
            .post(
                "/api/sales",
                Some(&admin),
                json!({ "orderId": order["id"], "amount": amount, "date": date }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, days) = srv.get("/api/sales/day", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        days,
        json!([
            { "_id": "2024-03-01", "totalSales": 70, "count": 2 },
            { "_id": "2024-03-02", "totalSales": 30, "count": 1 },
        ])
    );

    let (_, months) = srv.get("/api/sales/month", Some(&admin)).await;
    assert_eq!(months, json!([{ "_id": "2024-03", "totalSales": 100, "count": 3 }]));

    let shopper = srv.signup("Sam", "sam@example.com", "user").await;
    let (status, _) = srv.get("/api/sales/day", Some(&shopper)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

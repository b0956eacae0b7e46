//! An in-process stand-in for the platform's REST API.
//!
//! Records are kept as JSON values per collection. Every request is
//! recorded so tests can assert on exactly what reached the server, and
//! tests can force failures either per path or for write bodies with a
//! given field value.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use actix_web::dev::{HttpServiceFactory, Server};
use actix_web::http::StatusCode;
use actix_web::http::header::AUTHORIZATION;
use actix_web::middleware::NormalizePath;
use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, ResponseError, delete, get,
    patch, post, web,
};
use jiff::Timestamp;
use payloads::requests::LoginCredentials;
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Used when a list request has no `limit`.
const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    /// Without trailing slash.
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    pub fn query_param(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// Answer writes to `collection` whose body has `field == value` with
/// `status`.
#[derive(Debug, Clone)]
pub struct FailureRule {
    pub method: &'static str,
    pub collection: String,
    pub field: String,
    pub value: Value,
    pub status: u16,
}

#[derive(Debug, Clone)]
struct MockUser {
    id: i64,
    name: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct Store {
    records: HashMap<String, Vec<Value>>,
    next_id: i64,
    users: Vec<MockUser>,
    /// Token to user id.
    tokens: HashMap<String, i64>,
    requests: Vec<RecordedRequest>,
    failures: Vec<FailureRule>,
    overrides: HashMap<(String, String), u16>,
    latency: Duration,
}

impl Store {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find(&self, collection: &str, id: i64) -> Option<&Value> {
        self.records
            .get(collection)?
            .iter()
            .find(|record| record["id"].as_i64() == Some(id))
    }

    fn find_mut(&mut self, collection: &str, id: i64) -> Option<&mut Value> {
        self.records
            .get_mut(collection)?
            .iter_mut()
            .find(|record| record["id"].as_i64() == Some(id))
    }

    /// Replace `<name>_id` keys with the embedded reference the server
    /// returns for them.
    fn expand_relations(&self, body: &mut Map<String, Value>) {
        for (field, collection, keys) in [
            ("taxon", "taxa", &["id", "name", "rank"][..]),
            ("pipeline", "pipelines", &["id", "name"][..]),
            ("deployment", "deployments", &["id", "name"][..]),
        ] {
            let Some(id) = body
                .remove(&format!("{field}_id"))
                .and_then(|id| id.as_i64())
            else {
                continue;
            };
            let reference = match self.find(collection, id) {
                Some(record) => keys
                    .iter()
                    .map(|key| (key.to_string(), record[*key].clone()))
                    .collect::<Map<_, _>>()
                    .into(),
                None => json!({ "id": id }),
            };
            body.insert(field.to_string(), reference);
        }
    }
}

/// Shared state of one mock server.
#[derive(Default)]
pub struct MockState {
    store: Mutex<Store>,
}

impl MockState {
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a record, assigning an id when it has none. Returns the id.
    pub fn insert(&self, collection: &str, mut record: Value) -> i64 {
        let mut store = self.lock();
        let id = match record["id"].as_i64() {
            Some(id) => {
                store.next_id = store.next_id.max(id);
                id
            }
            None => {
                let id = store.allocate_id();
                record["id"] = id.into();
                id
            }
        };
        store
            .records
            .entry(collection.to_string())
            .or_default()
            .push(record);
        id
    }

    pub fn get(&self, collection: &str, id: i64) -> Option<Value> {
        self.lock().find(collection, id).cloned()
    }

    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.lock()
            .records
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_user(&self, name: &str, email: &str, password: &str) -> i64 {
        let mut store = self.lock();
        let id = store.allocate_id();
        store.users.push(MockUser {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        });
        id
    }

    /// Invalidate every issued token, as if they expired server-side.
    pub fn revoke_tokens(&self) {
        self.lock().tokens.clear();
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    pub fn fail_when(&self, rule: FailureRule) {
        self.lock().failures.push(rule);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Answer every `method` request to `path` with `status`.
    pub fn override_status(&self, method: &str, path: &str, status: u16) {
        let path = path.trim_end_matches('/').to_string();
        self.lock()
            .overrides
            .insert((method.to_uppercase(), path), status);
    }

    pub fn clear_overrides(&self) {
        self.lock().overrides.clear();
    }

    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Record the request and apply any forced response. Returns the user
    /// id behind the request's token, if it has a valid one.
    async fn admit(
        &self,
        req: &HttpRequest,
        body: Option<&Value>,
    ) -> Result<Option<i64>, MockError> {
        let latency = {
            let mut store = self.lock();
            let authorization = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let path = req.path().trim_end_matches('/').to_string();
            store.requests.push(RecordedRequest {
                method: req.method().to_string(),
                path,
                query: req.query_string().to_string(),
                authorization,
                body: body.cloned(),
            });
            store.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let store = self.lock();
        let method = req.method().as_str();
        let path = req.path().trim_end_matches('/');
        if let Some(status) =
            store.overrides.get(&(method.to_string(), path.to_string()))
        {
            return Err(MockError::Forced(*status));
        }
        if let Some(body) = body
            && let Some(rule) = store.failures.iter().find(|rule| {
                rule.method == method
                    && path.ends_with(&format!("/{}", rule.collection))
                    && body.get(&rule.field) == Some(&rule.value)
            })
        {
            return Err(MockError::Forced(rule.status));
        }

        let Some(header) = req.headers().get(AUTHORIZATION) else {
            return Ok(None);
        };
        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Token "))
            .ok_or(MockError::InvalidToken)?;
        store
            .tokens
            .get(token)
            .copied()
            .map(Some)
            .ok_or(MockError::InvalidToken)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,
    #[error("Invalid token.")]
    InvalidToken,
    #[error("Not found.")]
    NotFound,
    #[error("Invalid request")]
    Validation(Value),
    #[error("Forced response")]
    Forced(u16),
}

impl ResponseError for MockError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated => StatusCode::FORBIDDEN,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forced(status) => StatusCode::from_u16(*status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::Validation(errors) => errors.clone(),
            _ => json!({ "detail": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

fn require_user(user: Option<i64>) -> Result<i64, MockError> {
    user.ok_or(MockError::NotAuthenticated)
}

/// Bind the mock API to `ip:port`. Port 0 picks a free port; the bound
/// port is returned alongside the server.
pub fn build(
    state: Arc<MockState>,
    ip: &str,
    port: u16,
) -> std::io::Result<(Server, u16)> {
    let listener = TcpListener::bind(format!("{ip}:{port}"))?;
    let port = listener.local_addr()?.port();
    let state = web::Data::from(state);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(NormalizePath::trim())
            .app_data(state.clone())
            .service(api_services())
    })
    .workers(1)
    .listen(listener)?
    .run();
    Ok((server, port))
}

pub fn api_services() -> impl HttpServiceFactory {
    // Identity endpoints first, so they win over the generic patterns.
    web::scope("/api/v2")
        .service(login)
        .service(logout)
        .service(current_user)
        .service(list)
        .service(create)
        .service(retrieve)
        .service(update)
        .service(destroy)
        .service(action)
}

#[post("/auth/token/login")]
async fn login(
    state: web::Data<MockState>,
    req: HttpRequest,
    body: web::Json<Value>,
) -> Result<HttpResponse, MockError> {
    state.admit(&req, Some(&body.0)).await?;
    let credentials: LoginCredentials =
        serde_json::from_value(body.into_inner()).map_err(|e| {
            MockError::Validation(json!({
                "non_field_errors": [e.to_string()]
            }))
        })?;

    let mut store = state.lock();
    let Some(user) = store.users.iter().find(|user| {
        user.email == credentials.email
            && user.password == credentials.password
    }) else {
        return Err(MockError::Validation(json!({
            "non_field_errors": ["Unable to log in with provided credentials."]
        })));
    };
    let user_id = user.id;
    let token = Uuid::new_v4().simple().to_string();
    store.tokens.insert(token.clone(), user_id);
    Ok(HttpResponse::Ok().json(json!({ "auth_token": token })))
}

#[post("/auth/token/logout")]
async fn logout(
    state: web::Data<MockState>,
    req: HttpRequest,
) -> Result<HttpResponse, MockError> {
    require_user(state.admit(&req, None).await?)?;
    if let Some(token) = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Token "))
    {
        state.lock().tokens.remove(token);
    }
    Ok(HttpResponse::NoContent().finish())
}

#[get("/users/me")]
async fn current_user(
    state: web::Data<MockState>,
    req: HttpRequest,
) -> Result<HttpResponse, MockError> {
    let user_id = require_user(state.admit(&req, None).await?)?;
    let store = state.lock();
    let user = store
        .users
        .iter()
        .find(|user| user.id == user_id)
        .ok_or(MockError::NotFound)?;
    Ok(HttpResponse::Ok().json(json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "image": null,
    })))
}

#[get("/{collection}")]
async fn list(
    state: web::Data<MockState>,
    req: HttpRequest,
    collection: web::Path<String>,
    query: web::Query<Vec<(String, String)>>,
) -> Result<HttpResponse, MockError> {
    state.admit(&req, None).await?;

    let mut limit = DEFAULT_PAGE_SIZE;
    let mut offset = 0;
    let mut ordering = None;
    let mut filters = Vec::new();
    for (name, value) in query.into_inner() {
        match name.as_str() {
            "limit" => limit = value.parse().unwrap_or(DEFAULT_PAGE_SIZE),
            "offset" => offset = value.parse().unwrap_or(0),
            "ordering" => ordering = Some(value),
            "with_counts" => {}
            _ => filters.push((name, value)),
        }
    }

    let store = state.lock();
    let mut records: Vec<&Value> = store
        .records
        .get(collection.as_str())
        .map(|records| {
            records
                .iter()
                .filter(|record| {
                    filters.iter().all(|(field, value)| {
                        matches_filter(record, field, value)
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    records.sort_by(|a, b| compare_values(&a["id"], &b["id"]));
    if let Some(ordering) = &ordering {
        let (field, descending) = match ordering.strip_prefix('-') {
            Some(field) => (field, true),
            None => (ordering.as_str(), false),
        };
        records.sort_by(|a, b| {
            let order = compare_values(&a[field], &b[field]);
            if descending { order.reverse() } else { order }
        });
    }

    let count = records.len();
    let results: Vec<&Value> =
        records.into_iter().skip(offset).take(limit).collect();
    Ok(HttpResponse::Ok().json(json!({
        "count": count,
        "next": null,
        "previous": null,
        "results": results,
    })))
}

/// Filters on fields a record does not have are ignored, like unknown query
/// parameters on the real server. `<name>_id` also matches `<name>`, and
/// embedded references match on their id.
fn matches_filter(record: &Value, field: &str, expected: &str) -> bool {
    let candidate = record.get(field).or_else(|| {
        field
            .strip_suffix("_id")
            .and_then(|field| record.get(field))
    });
    candidate.is_none_or(|value| value_matches(value, expected))
}

fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::Object(map) => {
            map.get("id").is_some_and(|id| value_matches(id, expected))
        }
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        Value::Null => false,
        Value::Array(items) => {
            items.iter().any(|item| value_matches(item, expected))
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Object(x), Value::Object(y)) => compare_values(
            x.get("id").unwrap_or(&Value::Null),
            y.get("id").unwrap_or(&Value::Null),
        ),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[post("/{collection}")]
async fn create(
    state: web::Data<MockState>,
    req: HttpRequest,
    collection: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse, MockError> {
    require_user(state.admit(&req, Some(&body.0)).await?)?;
    let collection = collection.into_inner();
    let Value::Object(mut record) = body.into_inner() else {
        return Err(MockError::Validation(json!({
            "non_field_errors": ["Expected an object."]
        })));
    };
    if record.get("name").and_then(Value::as_str) == Some("") {
        return Err(MockError::Validation(json!({
            "name": ["This field may not be blank."]
        })));
    }

    let mut store = state.lock();
    store.expand_relations(&mut record);
    let id = store.allocate_id();
    let now = Timestamp::now().to_string();
    record.insert("id".into(), id.into());
    record.insert("created_at".into(), now.clone().into());
    record.insert("updated_at".into(), now.into());

    match collection.as_str() {
        "jobs" => {
            let start_now = record
                .remove("start_now")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let status = if start_now { "PENDING" } else { "CREATED" };
            record.insert("status".into(), status.into());
            record.insert("progress".into(), 0.0.into());
        }
        "identifications" => {
            let occurrence = record.get("occurrence").and_then(Value::as_i64);
            let taxon = record.get("taxon").cloned();
            if let (Some(occurrence), Some(taxon)) = (occurrence, taxon)
                && let Some(target) = store.find_mut("occurrences", occurrence)
            {
                target["determination"] = taxon;
                target["determination_score"] = 1.0.into();
                let count =
                    target["identifications_count"].as_u64().unwrap_or(0);
                target["identifications_count"] = (count + 1).into();
            }
        }
        _ => {}
    }

    let record = Value::Object(record);
    store
        .records
        .entry(collection)
        .or_default()
        .push(record.clone());
    Ok(HttpResponse::Created().json(record))
}

#[get("/{collection}/{id}")]
async fn retrieve(
    state: web::Data<MockState>,
    req: HttpRequest,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse, MockError> {
    state.admit(&req, None).await?;
    let (collection, id) = path.into_inner();
    let store = state.lock();
    let record = store.find(&collection, id).ok_or(MockError::NotFound)?;
    Ok(HttpResponse::Ok().json(record))
}

#[patch("/{collection}/{id}")]
async fn update(
    state: web::Data<MockState>,
    req: HttpRequest,
    path: web::Path<(String, i64)>,
    body: web::Json<Value>,
) -> Result<HttpResponse, MockError> {
    require_user(state.admit(&req, Some(&body.0)).await?)?;
    let (collection, id) = path.into_inner();
    let Value::Object(mut changes) = body.into_inner() else {
        return Err(MockError::Validation(json!({
            "non_field_errors": ["Expected an object."]
        })));
    };

    let mut store = state.lock();
    store.expand_relations(&mut changes);
    let record = store.find_mut(&collection, id).ok_or(MockError::NotFound)?;
    for (key, value) in changes {
        record[key.as_str()] = value;
    }
    record["updated_at"] = Timestamp::now().to_string().into();
    Ok(HttpResponse::Ok().json(record.clone()))
}

#[delete("/{collection}/{id}")]
async fn destroy(
    state: web::Data<MockState>,
    req: HttpRequest,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse, MockError> {
    require_user(state.admit(&req, None).await?)?;
    let (collection, id) = path.into_inner();
    let mut store = state.lock();
    let records = store
        .records
        .get_mut(&collection)
        .ok_or(MockError::NotFound)?;
    let before = records.len();
    records.retain(|record| record["id"].as_i64() != Some(id));
    if records.len() == before {
        return Err(MockError::NotFound);
    }
    Ok(HttpResponse::NoContent().finish())
}

#[post("/{collection}/{id}/{action}")]
async fn action(
    state: web::Data<MockState>,
    req: HttpRequest,
    path: web::Path<(String, i64, String)>,
) -> Result<HttpResponse, MockError> {
    require_user(state.admit(&req, None).await?)?;
    let (collection, id, action) = path.into_inner();
    let mut store = state.lock();
    let record = store.find_mut(&collection, id).ok_or(MockError::NotFound)?;
    if collection == "jobs" {
        let status = match action.as_str() {
            "run" | "retry" => "PENDING",
            "cancel" => "REVOKED",
            _ => return Err(MockError::NotFound),
        };
        record["status"] = status.into();
    }
    Ok(HttpResponse::Ok().json(record.clone()))
}

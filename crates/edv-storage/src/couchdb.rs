//! CouchDB storage provider.
//!
//! Each named store maps to one CouchDB database and each key to one CouchDB
//! document, spoken to over CouchDB's HTTP/JSON API. Values must therefore be
//! JSON objects. CouchDB's bookkeeping fields (`_id`, `_rev`) are stripped on
//! read so callers get back what they wrote.
//!
//! Store names and keys are mapped onto CouchDB's naming rules reversibly, so
//! every name the in-memory provider accepts addresses its own database and
//! document here too:
//!
//! - a name that is already a legal database name is used as is; any other is
//!   hex-encoded behind the `h$` marker, which a legal plain name never
//!   contains;
//! - a key that is empty, a dot segment, or starts with `_` (CouchDB's reserved
//!   namespace) or `~` is prefixed with `~`.
//!
//! Feature-gated behind `couchdb-backend`. Every request is bounded by the
//! configured timeout, and dropping a pending future cancels the request.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::header::ETAG;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{Provider, StorageError, Store};

/// Fields CouchDB attaches to every stored document.
const BOOKKEEPING_FIELDS: [&str; 2] = ["_id", "_rev"];

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest database name CouchDB accepts.
const MAX_DATABASE_NAME: usize = 238;
/// Marks a database name that carries a hex-encoded store name.
const ENCODED_NAME_MARKER: &str = "h$";
const KEY_ESCAPE: char = '~';

/// The CouchDB database backing the store `name`.
fn database_name(name: &str) -> Result<String, StorageError> {
    let mut chars = name.chars();
    let legal = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_()+-/".contains(c));

    let database = if legal {
        name.to_owned()
    } else {
        format!("{ENCODED_NAME_MARKER}{}", hex::encode(name))
    };
    if database.len() > MAX_DATABASE_NAME {
        return Err(StorageError::InvalidValue {
            key: name.to_owned(),
            reason: format!(
                "encodes to a {}-byte database name, limit is {MAX_DATABASE_NAME}",
                database.len()
            ),
        });
    }
    Ok(database)
}

/// The CouchDB document id for `key`.
fn document_id(key: &str) -> Cow<'_, str> {
    if key.is_empty() || key == "." || key == ".." || key.starts_with(['_', KEY_ESCAPE]) {
        Cow::Owned(format!("{KEY_ESCAPE}{key}"))
    } else {
        Cow::Borrowed(key)
    }
}

/// Connection settings for [`CouchDbProvider`].
#[derive(Debug, Clone)]
pub struct CouchDbConfig {
    /// Base URL of the CouchDB server, optionally with `user:password@`.
    pub url: String,
    /// Upper bound on a whole request, including the response body.
    pub request_timeout: Duration,
    /// Upper bound on establishing a connection.
    pub connect_timeout: Duration,
}

impl CouchDbConfig {
    /// Settings for `url` with default timeouts.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP client plus the credential-free base URL.
struct Connection {
    client: Client,
    base: String,
    username: Option<String>,
    password: Option<String>,
}

impl Connection {
    fn new(config: &CouchDbConfig) -> Result<Self, StorageError> {
        if config.url.trim().is_empty() {
            return Err(StorageError::InvalidConfig {
                reason: "CouchDB URL must not be blank".to_owned(),
            });
        }

        let mut url = Url::parse(&config.url).map_err(|e| StorageError::InvalidConfig {
            reason: format!("invalid CouchDB URL: {e}"),
        })?;
        if url.cannot_be_a_base() {
            return Err(StorageError::InvalidConfig {
                reason: "CouchDB URL must be an http(s) base URL".to_owned(),
            });
        }

        let username = Some(url.username().to_owned()).filter(|u| !u.is_empty());
        let password = url.password().map(ToOwned::to_owned);
        url.set_username("")
            .and_then(|()| url.set_password(None))
            .map_err(|()| StorageError::InvalidConfig {
                reason: "failed to strip credentials from CouchDB URL".to_owned(),
            })?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StorageError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base: url.as_str().trim_end_matches('/').to_owned(),
            username,
            password,
        })
    }

    /// Build a request for `/{segment}/{segment}...`, percent-encoding each
    /// segment so names containing `/` address a single database.
    ///
    /// Segments must already be mapped by [`database_name`] or [`document_id`]:
    /// a bare `.` or `..` would be collapsed by URL normalization.
    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut url = self.base.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }

        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }
}

fn request_error(operation: &str, err: &reqwest::Error) -> StorageError {
    if err.is_timeout() {
        StorageError::Timeout {
            operation: operation.to_owned(),
        }
    } else {
        StorageError::Backend {
            operation: operation.to_owned(),
            reason: err.to_string(),
        }
    }
}

async fn unexpected_status(operation: &str, response: Response) -> StorageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StorageError::Backend {
        operation: operation.to_owned(),
        reason: format!("unexpected status {status}: {body}"),
    }
}

/// A provider whose stores are CouchDB databases.
///
/// The provider keeps its own registry of opened stores. Closing a store (or
/// the whole provider) severs the handles it gave out; the databases
/// themselves stay on the server.
///
/// # Examples
///
/// ```no_run
/// # use edv_storage::{CouchDbConfig, CouchDbProvider, Provider};
/// # #[tokio::main]
/// # async fn main() {
/// let provider = CouchDbProvider::new(&CouchDbConfig::new("http://admin:pw@localhost:5984")).unwrap();
/// let store = provider.open_store("vault-1").await.unwrap();
/// # }
/// ```
pub struct CouchDbProvider {
    connection: Arc<Connection>,
    stores: RwLock<HashMap<String, CouchDbStore>>,
}

impl std::fmt::Debug for CouchDbProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchDbProvider")
            .field("url", &self.connection.base)
            .finish_non_exhaustive()
    }
}

impl CouchDbProvider {
    /// Build a provider for the CouchDB server described by `config`.
    ///
    /// No request is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if the URL is blank or invalid.
    pub fn new(config: &CouchDbConfig) -> Result<Self, StorageError> {
        Ok(Self {
            connection: Arc::new(Connection::new(config)?),
            stores: RwLock::new(HashMap::new()),
        })
    }

    /// Create the database `name`, treating "already exists" as success.
    async fn provision(&self, name: &str) -> Result<(), StorageError> {
        const OPERATION: &str = "create database";

        let response = self
            .connection
            .request(Method::PUT, &[name])
            .send()
            .await
            .map_err(|e| request_error(OPERATION, &e))?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!(store = %name, "created CouchDB database");
                Ok(())
            }
            StatusCode::PRECONDITION_FAILED => Ok(()),
            _ => Err(unexpected_status(OPERATION, response).await),
        }
    }
}

#[async_trait::async_trait]
impl Provider for CouchDbProvider {
    async fn open_store(&self, name: &str) -> Result<Arc<dyn Store>, StorageError> {
        if let Some(store) = self.stores.read().await.get(name) {
            return Ok(Arc::new(store.clone()));
        }

        let database = database_name(name)?;
        self.provision(&database).await?;

        let mut stores = self.stores.write().await;
        let store = stores
            .entry(name.to_owned())
            .or_insert_with(|| CouchDbStore {
                name: name.to_owned(),
                database,
                connection: Arc::clone(&self.connection),
                open: Arc::new(AtomicBool::new(true)),
            })
            .clone();
        Ok(Arc::new(store))
    }

    async fn store_exists(&self, name: &str) -> Result<bool, StorageError> {
        const OPERATION: &str = "check database";

        if self.stores.read().await.contains_key(name) {
            return Ok(true);
        }
        // A name that cannot map to a database was never created.
        let Ok(database) = database_name(name) else {
            return Ok(false);
        };

        let response = self
            .connection
            .request(Method::HEAD, &[&database])
            .send()
            .await
            .map_err(|e| request_error(OPERATION, &e))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected_status(OPERATION, response).await),
        }
    }

    async fn close_store(&self, name: &str) -> Result<(), StorageError> {
        let removed = self.stores.write().await.remove(name);
        let Some(store) = removed else {
            return Err(StorageError::StoreNotFound {
                name: name.to_owned(),
            });
        };

        store.open.store(false, Ordering::Release);
        debug!(store = %name, "released CouchDB store handle");
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        let mut stores = self.stores.write().await;
        let closed = stores.len();
        for (_, store) in stores.drain() {
            store.open.store(false, Ordering::Release);
        }
        debug!(closed, "closed CouchDB provider");
        Ok(())
    }
}

/// A handle to one CouchDB database.
///
/// Clones share the open flag, so releasing the store through the provider
/// invalidates every outstanding handle.
#[derive(Clone)]
pub struct CouchDbStore {
    name: String,
    database: String,
    connection: Arc<Connection>,
    open: Arc<AtomicBool>,
}

impl std::fmt::Debug for CouchDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchDbStore")
            .field("name", &self.name)
            .field("database", &self.database)
            .field("open", &self.open.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl CouchDbStore {
    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StorageError::StoreClosed {
                name: self.name.clone(),
            })
        }
    }

    async fn put_document(
        &self,
        key: &str,
        document: &Map<String, Value>,
    ) -> Result<Response, StorageError> {
        self.connection
            .request(Method::PUT, &[&self.database, &document_id(key)])
            .json(document)
            .send()
            .await
            .map_err(|e| request_error("put document", &e))
    }

    /// Fetch the current revision of `key` from its `ETag`.
    async fn current_revision(&self, key: &str) -> Result<String, StorageError> {
        const OPERATION: &str = "read document revision";

        let response = self
            .connection
            .request(Method::HEAD, &[&self.database, &document_id(key)])
            .send()
            .await
            .map_err(|e| request_error(OPERATION, &e))?;

        if response.status() != StatusCode::OK {
            return Err(unexpected_status(OPERATION, response).await);
        }

        response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_owned())
            .ok_or_else(|| StorageError::Backend {
                operation: OPERATION.to_owned(),
                reason: format!("no ETag returned for '{key}'"),
            })
    }
}

#[async_trait::async_trait]
impl Store for CouchDbStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.ensure_open()?;

        let mut document: Map<String, Value> =
            serde_json::from_slice(value).map_err(|e| StorageError::InvalidValue {
                key: key.to_owned(),
                reason: format!("CouchDB values must be JSON objects: {e}"),
            })?;

        let response = self.put_document(key, &document).await?;
        let response = if response.status() == StatusCode::CONFLICT {
            // Overwrite: CouchDB only accepts an update that names the revision it replaces.
            let revision = self.current_revision(key).await?;
            document.insert("_rev".to_owned(), Value::String(revision));
            self.put_document(key, &document).await?
        } else {
            response
        };

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => Ok(()),
            _ => Err(unexpected_status("put document", response).await),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        const OPERATION: &str = "get document";

        self.ensure_open()?;

        let response = self
            .connection
            .request(Method::GET, &[&self.database, &document_id(key)])
            .send()
            .await
            .map_err(|e| request_error(OPERATION, &e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                // A missing database also answers 404; only a missing document is "not found".
                let body: Value = response.json().await.unwrap_or(Value::Null);
                let reason = body.get("reason").and_then(Value::as_str).unwrap_or("");
                return if matches!(reason, "missing" | "deleted") {
                    Err(StorageError::ValueNotFound {
                        key: key.to_owned(),
                    })
                } else {
                    Err(StorageError::Backend {
                        operation: OPERATION.to_owned(),
                        reason: format!("database '{}' not found: {reason}", self.name),
                    })
                };
            }
            _ => return Err(unexpected_status(OPERATION, response).await),
        }

        let mut document: Map<String, Value> =
            response.json().await.map_err(|e| StorageError::Backend {
                operation: OPERATION.to_owned(),
                reason: format!("malformed document body: {e}"),
            })?;
        for field in BOOKKEEPING_FIELDS {
            document.remove(field);
        }

        serde_json::to_vec(&document).map_err(|e| StorageError::Backend {
            operation: OPERATION.to_owned(),
            reason: format!("failed to re-encode document: {e}"),
        })
    }
}

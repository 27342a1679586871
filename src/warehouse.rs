//! Warehouse connection provisioning.
//!
//! Attaching a connection is two dependent calls. The credential test
//! returns a one-time [`ValidationKey`] and the attach call consumes it.
//! [`ValidationKey`] is not `Clone`, so a key reaches the API at most once
//! and is never replayed after a failed attach.
//!
//! Each connection variant of [`ConnectionCredentials`] knows how to test
//! itself and which jobs it runs; the resources only pick a [`Destination`]
//! and a [`CredentialRotation`] policy.

use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use tracing::{debug, info};

use crate::client::warehouse::{
    AddConnection, AddConnectionVariables, BqConnectionDetails, BqTestDiagnostic,
    DatabaseTestDiagnostic, TestBqCredentialsV2, TestBqCredentialsV2Variables,
    TestDatabaseCredentials, TestDatabaseCredentialsVariables, UpdateCredentials,
    UpdateCredentialsV2, UpdateCredentialsV2Variables, UpdateCredentialsVariables,
    BQ_CONNECTION_TYPE, BQ_CONNECTION_TYPE_RESPONSE, TRX_CONNECTION_TYPE,
    TRX_CONNECTION_TYPE_RESPONSE,
};
use crate::client::{JsonString, MonteCarloClient, MonteCarloClientExt, Uuid};
use crate::error::ProviderError;
use crate::schema::Diagnostic;

const VALIDATION_NAME: &str = "save_credentials";

/// Connection details of a transactional database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    /// Host name.
    pub host: String,
    /// Port.
    pub port: i64,
    /// Database name.
    pub database: String,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials of one warehouse connection, per connection variant.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionCredentials {
    /// A BigQuery service account key.
    BigQuery {
        /// Service account key JSON.
        service_account_key: String,
    },
    /// A PostgreSQL database.
    Postgres(DatabaseCredentials),
    /// A MySQL database.
    MySql(DatabaseCredentials),
    /// A SQL Server database.
    SqlServer(DatabaseCredentials),
}

impl fmt::Debug for ConnectionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BigQuery { .. } => f
                .debug_struct("BigQuery")
                .field("service_account_key", &"<redacted>")
                .finish(),
            Self::Postgres(db) => f.debug_tuple("Postgres").field(db).finish(),
            Self::MySql(db) => f.debug_tuple("MySql").field(db).finish(),
            Self::SqlServer(db) => f.debug_tuple("SqlServer").field(db).finish(),
        }
    }
}

impl ConnectionCredentials {
    /// Database credentials for a configured `db_type` (`POSTGRES`, `MYSQL`, `SQL_SERVER`).
    pub fn database(db_type: &str, credentials: DatabaseCredentials) -> Result<Self, ProviderError> {
        match db_type {
            "POSTGRES" => Ok(Self::Postgres(credentials)),
            "MYSQL" => Ok(Self::MySql(credentials)),
            "SQL_SERVER" => Ok(Self::SqlServer(credentials)),
            other => Err(ProviderError::Validation(format!(
                "unsupported database type '{}'",
                other
            ))),
        }
    }

    /// Connection type as reported back by the API.
    pub fn response_type(&self) -> &'static str {
        match self {
            Self::BigQuery { .. } => BQ_CONNECTION_TYPE_RESPONSE,
            _ => TRX_CONNECTION_TYPE_RESPONSE,
        }
    }

    /// Lower-cased engine name sent to the API, `None` for BigQuery.
    pub fn db_type(&self) -> Option<&'static str> {
        match self {
            Self::BigQuery { .. } => None,
            Self::Postgres(_) => Some("postgres"),
            Self::MySql(_) => Some("mysql"),
            Self::SqlServer(_) => Some("sql_server"),
        }
    }

    /// Whether any validation warning aborts provisioning.
    ///
    /// Transactional connections are only attached on a clean test.
    pub fn warnings_are_fatal(&self) -> bool {
        !matches!(self, Self::BigQuery { .. })
    }

    /// Default rotation policy of the connection variant.
    pub fn default_rotation(&self) -> CredentialRotation {
        match self {
            Self::BigQuery { .. } => CredentialRotation::InPlace {
                should_replace: true,
                should_validate: true,
            },
            _ => CredentialRotation::TemporaryKey,
        }
    }

    /// Credential material submitted by an in-place rotation.
    pub fn changes(&self) -> Result<JsonString, ProviderError> {
        match self {
            Self::BigQuery {
                service_account_key,
            } => JsonString::new(service_account_key.clone()),
            Self::Postgres(db) | Self::MySql(db) | Self::SqlServer(db) => {
                Ok(JsonString::from_value(&json!({
                    "db_type": self.db_type(),
                    "host": db.host,
                    "port": db.port.to_string(),
                    "user": db.username,
                    "password": db.password,
                })))
            },
        }
    }
}

/// A one-time token returned by a successful credential test.
///
/// Consumed by value by [`ConnectionProvisioner::attach_connection`] and
/// [`rotate_credentials`].
#[derive(PartialEq, Eq)]
pub struct ValidationKey(String);

impl ValidationKey {
    fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ValidationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidationKey(<redacted>)")
    }
}

/// Outcome of a credential test.
#[derive(Debug)]
pub struct CredentialValidation {
    /// Whether the credentials were accepted.
    pub success: bool,
    /// Key for the following attach or rotation call.
    pub key: Option<ValidationKey>,
    /// Every finding the API reported.
    pub diagnostics: Vec<Diagnostic>,
}

impl CredentialValidation {
    /// Take the key of a passed test, or fail with every reported finding.
    ///
    /// With `warnings_are_fatal` any finding fails the test.
    pub fn accept(
        self,
        warnings_are_fatal: bool,
    ) -> Result<(ValidationKey, Vec<Diagnostic>), ProviderError> {
        if !self.success || (warnings_are_fatal && !self.diagnostics.is_empty()) {
            return Err(ProviderError::CredentialValidation(self.diagnostics));
        }
        match self.key {
            Some(key) => Ok((key, self.diagnostics)),
            None => {
                let mut diagnostics = self.diagnostics;
                diagnostics.push(Diagnostic::error("Credential test returned no key"));
                Err(ProviderError::CredentialValidation(diagnostics))
            },
        }
    }
}

/// Where a new connection is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Attach to an existing warehouse.
    Existing(Uuid),
    /// Create a warehouse with this name.
    New {
        /// Name of the new warehouse.
        name: String,
    },
}

/// A connection returned by the attach call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedConnection {
    /// Owning warehouse.
    pub warehouse_uuid: String,
    /// Name of the owning warehouse.
    pub warehouse_name: String,
    /// The new connection.
    pub connection_uuid: String,
    /// Creation timestamp of the connection.
    pub created_on: String,
}

/// How credentials of an attached connection are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRotation {
    /// Test the new credentials, then hand the temporary key to `updateCredentialsV2`.
    TemporaryKey,
    /// Submit the credential material to `updateCredentials`.
    InPlace {
        /// Replace instead of merging the stored credentials.
        should_replace: bool,
        /// Ask the API to validate before storing.
        should_validate: bool,
    },
}

/// Result of a credential rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotatedCredentials {
    /// New update timestamp of the connection.
    pub updated_at: Option<String>,
    /// Non-fatal findings of the credential test.
    pub diagnostics: Vec<Diagnostic>,
}

/// The two provisioning steps of a connection variant.
#[async_trait]
pub trait ConnectionProvisioner: Send + Sync {
    /// Connection type submitted to the API.
    fn connection_type(&self) -> &'static str;

    /// Jobs enabled on the connection.
    fn job_types(&self) -> Vec<String>;

    /// Submit the credentials to the credential test.
    async fn test_credentials(
        &self,
        client: &dyn MonteCarloClient,
    ) -> Result<CredentialValidation, ProviderError>;

    /// Attach a connection using the key of a passed test.
    async fn attach_connection(
        &self,
        client: &dyn MonteCarloClient,
        key: ValidationKey,
        destination: Destination,
        collector: &Uuid,
    ) -> Result<AttachedConnection, ProviderError> {
        let connection_type = self.connection_type();
        let (dw_id, name, create_warehouse_type) = match destination {
            Destination::Existing(uuid) => (Some(uuid), None, None),
            Destination::New { name } => (None, Some(name), Some(connection_type.to_string())),
        };

        let data = client
            .mutate::<AddConnection>(AddConnectionVariables {
                dc_id: collector.clone(),
                dw_id,
                key: key.into_inner(),
                job_types: self.job_types(),
                name,
                connection_type: connection_type.to_string(),
                create_warehouse_type,
            })
            .await?;

        let connection = data.add_connection.connection;
        info!(
            connection_type,
            warehouse_uuid = %connection.warehouse.uuid,
            connection_uuid = %connection.uuid,
            "Connection attached"
        );
        Ok(AttachedConnection {
            warehouse_uuid: connection.warehouse.uuid,
            warehouse_name: connection.warehouse.name,
            connection_uuid: connection.uuid,
            created_on: connection.created_on,
        })
    }
}

#[async_trait]
impl ConnectionProvisioner for ConnectionCredentials {
    fn connection_type(&self) -> &'static str {
        match self {
            Self::BigQuery { .. } => BQ_CONNECTION_TYPE,
            _ => TRX_CONNECTION_TYPE,
        }
    }

    fn job_types(&self) -> Vec<String> {
        let mut jobs = vec!["metadata".to_string(), "sql_query".to_string()];
        if matches!(self, Self::BigQuery { .. }) {
            jobs.push("query_logs".to_string());
            jobs.push("json_schema".to_string());
        }
        jobs
    }

    async fn test_credentials(
        &self,
        client: &dyn MonteCarloClient,
    ) -> Result<CredentialValidation, ProviderError> {
        match self {
            Self::BigQuery {
                service_account_key,
            } => test_bigquery(client, service_account_key).await,
            Self::Postgres(db) | Self::MySql(db) | Self::SqlServer(db) => {
                let db_type = self.db_type().unwrap_or_default();
                test_database(client, db_type, db).await
            },
        }
    }
}

async fn test_bigquery(
    client: &dyn MonteCarloClient,
    service_account_key: &str,
) -> Result<CredentialValidation, ProviderError> {
    let data = client
        .mutate::<TestBqCredentialsV2>(TestBqCredentialsV2Variables {
            validation_name: VALIDATION_NAME.to_string(),
            connection_details: BqConnectionDetails {
                service_json: STANDARD.encode(service_account_key),
            },
        })
        .await?;

    let result = data.test_bq_credentials_v2;
    let validation = result.validation_result;
    let success = validation.success && validation.errors.is_empty();
    debug!(
        success,
        warnings = validation.warnings.len(),
        errors = validation.errors.len(),
        "BigQuery credential test completed"
    );

    let diagnostics = validation
        .warnings
        .iter()
        .map(|w| bq_diagnostic(Diagnostic::warning, w))
        .chain(validation.errors.iter().map(|e| bq_diagnostic(Diagnostic::error, e)))
        .collect();

    Ok(CredentialValidation {
        success,
        key: result.key.filter(|k| !k.is_empty()).map(ValidationKey),
        diagnostics,
    })
}

fn bq_diagnostic(make: fn(String) -> Diagnostic, finding: &BqTestDiagnostic) -> Diagnostic {
    let summary = finding
        .friendly_message
        .clone()
        .or_else(|| finding.cause.clone())
        .unwrap_or_else(|| "BigQuery credential test reported a problem".to_string());
    let diagnostic = make(summary);
    match &finding.resolution {
        Some(resolution) if !resolution.is_empty() => diagnostic.with_detail(resolution.clone()),
        _ => diagnostic,
    }
}

async fn test_database(
    client: &dyn MonteCarloClient,
    db_type: &str,
    db: &DatabaseCredentials,
) -> Result<CredentialValidation, ProviderError> {
    let data = client
        .mutate::<TestDatabaseCredentials>(TestDatabaseCredentialsVariables {
            connection_type: TRX_CONNECTION_TYPE.to_string(),
            db_name: db.database.clone(),
            db_type: db_type.to_string(),
            host: db.host.clone(),
            port: db.port,
            user: db.username.clone(),
            password: db.password.clone(),
        })
        .await?;

    let result = data.test_database_credentials;
    debug!(
        success = result.success,
        db_type,
        warnings = result.warnings.len(),
        validations = result.validations.len(),
        "Database credential test completed"
    );

    let diagnostics = result
        .warnings
        .iter()
        .chain(result.validations.iter())
        .map(database_diagnostic)
        .collect();

    Ok(CredentialValidation {
        success: result.success,
        key: result.key.filter(|k| !k.is_empty()).map(ValidationKey),
        diagnostics,
    })
}

fn database_diagnostic(finding: &DatabaseTestDiagnostic) -> Diagnostic {
    let diagnostic = Diagnostic::warning(
        finding
            .message
            .clone()
            .unwrap_or_else(|| "Database credential test reported a problem".to_string()),
    );
    match &finding.kind {
        Some(kind) if !kind.is_empty() => diagnostic.with_detail(kind.clone()),
        _ => diagnostic,
    }
}

/// Test the credentials and attach a connection on success.
///
/// Returns the non-fatal findings of the test next to the connection.
pub async fn add_connection(
    client: &dyn MonteCarloClient,
    credentials: &ConnectionCredentials,
    destination: Destination,
    collector: &Uuid,
) -> Result<(AttachedConnection, Vec<Diagnostic>), ProviderError> {
    let validation = credentials.test_credentials(client).await?;
    let (key, diagnostics) = validation.accept(credentials.warnings_are_fatal())?;
    let connection = credentials
        .attach_connection(client, key, destination, collector)
        .await?;
    Ok((connection, diagnostics))
}

/// Replace the credentials of an attached connection.
pub async fn rotate_credentials(
    client: &dyn MonteCarloClient,
    credentials: &ConnectionCredentials,
    connection: &Uuid,
    rotation: CredentialRotation,
) -> Result<RotatedCredentials, ProviderError> {
    let (result, diagnostics) = match rotation {
        CredentialRotation::TemporaryKey => {
            let validation = credentials.test_credentials(client).await?;
            let (key, diagnostics) = validation.accept(credentials.warnings_are_fatal())?;
            let data = client
                .mutate::<UpdateCredentialsV2>(UpdateCredentialsV2Variables {
                    connection_id: connection.clone(),
                    temp_credentials_key: key.into_inner(),
                })
                .await?;
            (data.update_credentials_v2, diagnostics)
        },
        CredentialRotation::InPlace {
            should_replace,
            should_validate,
        } => {
            let data = client
                .mutate::<UpdateCredentials>(UpdateCredentialsVariables {
                    changes: credentials.changes()?,
                    connection_id: connection.clone(),
                    should_replace,
                    should_validate,
                })
                .await?;
            (data.update_credentials, Vec::new())
        },
    };

    if !result.success {
        return Err(ProviderError::Api(
            "MC client 'UpdateCredentials' mutation - success = false, connection probably \
             doesnt exists. Rerunning the operation usually helps."
                .to_string(),
        ));
    }

    info!(connection_uuid = %connection, ?rotation, "Connection credentials rotated");
    Ok(RotatedCredentials {
        updated_at: result.updated_at,
        diagnostics,
    })
}

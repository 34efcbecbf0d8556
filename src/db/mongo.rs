//! MongoDB client wrapper

use bson::{doc, Document};
use mongodb::{Client, Collection, Database};
use serde::Serialize;
use tracing::info;

use crate::types::NarthexError;

/// Effective connection parameters, reported by the config-options routes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConnectionProfile {
    pub pool_size: u32,
    pub wtimeout: u64,
}

/// First granted role of the authenticated caller, as reported by the
/// `connectionStatus` command.
#[derive(Debug, Clone, Serialize)]
pub struct RoleInfo {
    pub role: String,
    pub db: String,
}

/// MongoDB client wrapper
///
/// Built once at startup; repositories take collection handles from it.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db_name: String,
    profile: ConnectionProfile,
}

impl MongoStore {
    /// Connect and verify the connection with a ping
    pub async fn connect(
        uri: &str,
        db_name: &str,
        profile: ConnectionProfile,
    ) -> Result<Self, NarthexError> {
        info!("Connecting to MongoDB at {}", uri);

        // serverSelectionTimeoutMS keeps startup from hanging on an
        // unreachable MongoDB; maxPoolSize applies the configured pool size
        let sep = if uri.contains('?') { '&' } else { '?' };
        let tuned_uri = format!(
            "{}{}serverSelectionTimeoutMS=3000&connectTimeoutMS=3000&maxPoolSize={}",
            uri, sep, profile.pool_size
        );

        let client = Client::with_uri_str(&tuned_uri)
            .await
            .map_err(|e| NarthexError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| NarthexError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
            profile,
        })
    }

    /// Get a schema-less collection handle
    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.database().collection::<Document>(name)
    }

    /// Get the database handle
    pub fn database(&self) -> Database {
        self.client.database(&self.db_name)
    }

    /// Liveness probe used by the health route
    pub async fn ping(&self) -> Result<(), NarthexError> {
        self.database()
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| NarthexError::Database(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    /// Effective pool size and write timeout
    pub fn profile(&self) -> ConnectionProfile {
        self.profile
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// First granted role of the authenticated caller
    ///
    /// Returns `None` on an unauthenticated connection, which carries no
    /// roles in its `connectionStatus` response.
    pub async fn caller_role(&self) -> Result<Option<RoleInfo>, NarthexError> {
        let status = self
            .database()
            .run_command(doc! { "connectionStatus": 1 })
            .await
            .map_err(|e| NarthexError::Query(format!("connectionStatus failed: {}", e)))?;

        let role = status
            .get_document("authInfo")
            .ok()
            .and_then(|info| info.get_array("authenticatedUserRoles").ok())
            .and_then(|roles| roles.first())
            .and_then(|role| role.as_document())
            .map(|role| RoleInfo {
                role: role.get_str("role").unwrap_or("").to_string(),
                db: role.get_str("db").unwrap_or("").to_string(),
            });

        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running MongoDB instance;
    // connection handling is exercised through the repository tests
    // that never touch the network.
}

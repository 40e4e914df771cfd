//! Neo4j connection management for the graph-backed inventory.

use neo4rs::{query, ConfigBuilder, Graph, Query};

use crate::store::{Result, StoreError};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "netroster-dev".to_string(),
            max_connections: 16,
            fetch_size: 256,
        }
    }
}

/// Neo4j-backed inventory store.
///
/// Segments are `(:Segment)` nodes keyed by a unique `subnet`; devices are
/// `(:Device)` nodes linked to their owner with `[:BELONGS_TO]`.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    /// Connect to Neo4j and make sure the uniqueness constraints exist.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { graph };
        store.ensure_schema().await?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j inventory");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.run(query(
            "CREATE CONSTRAINT segment_subnet IF NOT EXISTS
             FOR (s:Segment) REQUIRE s.subnet IS UNIQUE",
        ))
        .await?;
        self.run(query(
            "CREATE CONSTRAINT device_id IF NOT EXISTS
             FOR (d:Device) REQUIRE d.id IS UNIQUE",
        ))
        .await
    }

    /// Execute a write-only query.
    pub async fn run(&self, query: Query) -> Result<()> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }

    /// Begin a transaction.
    pub async fn start_txn(&self) -> Result<neo4rs::Txn> {
        Ok(self.graph.start_txn().await?)
    }
}

//! DynamoDB session backend.
//!
//! Table schema:
//! - `id` (S): partition key
//! - `data` (S): codec-encoded session values
//! - `modified_at` (N): Unix timestamp of the last write
//! - `ttl` (N): Unix timestamp for DynamoDB automatic cleanup (optional)

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType, TableStatus, TimeToLiveSpecification,
};

use super::{SessionBackend, StoredRecord};
use crate::config::StoreOptions;
use crate::error::StoreError;

const ID_ATTR: &str = "id";
const DATA_ATTR: &str = "data";
const MODIFIED_AT_ATTR: &str = "modified_at";
const TTL_ATTR: &str = "ttl";

const ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const ACTIVE_TIMEOUT: Duration = Duration::from_secs(300);

/// DynamoDB session backend.
pub struct DynamoDbBackend {
    client: Client,
    table_name: String,
}

impl DynamoDbBackend {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// Build a client for the configured region and endpoint, then make sure
    /// the table exists.
    pub async fn connect(options: &StoreOptions) -> Result<Self, StoreError> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(options.region.clone()))
            .load()
            .await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let backend = Self::new(Client::from_conf(builder.build()), options.table.clone());

        backend
            .bootstrap(
                options.read_capacity,
                options.write_capacity,
                options.ttl_enabled,
            )
            .await?;
        Ok(backend)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the table if it does not exist. An existing table is left as is.
    pub async fn bootstrap(
        &self,
        read_capacity: i64,
        write_capacity: i64,
        ttl_enabled: bool,
    ) -> Result<(), StoreError> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => {
                tracing::debug!("Session table {} already exists", self.table_name);
                Ok(())
            }
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) =>
            {
                self.create_table(read_capacity, write_capacity, ttl_enabled)
                    .await
            }
            Err(e) => Err(StoreError::provision(e)),
        }
    }

    async fn create_table(
        &self,
        read_capacity: i64,
        write_capacity: i64,
        ttl_enabled: bool,
    ) -> Result<(), StoreError> {
        tracing::info!(
            "Creating session table {} (read: {}, write: {})",
            self.table_name,
            read_capacity,
            write_capacity
        );

        let attribute = AttributeDefinition::builder()
            .attribute_name(ID_ATTR)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(StoreError::provision)?;
        let key = KeySchemaElement::builder()
            .attribute_name(ID_ATTR)
            .key_type(KeyType::Hash)
            .build()
            .map_err(StoreError::provision)?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(read_capacity)
            .write_capacity_units(write_capacity)
            .build()
            .map_err(StoreError::provision)?;

        self.client
            .create_table()
            .table_name(&self.table_name)
            .attribute_definitions(attribute)
            .key_schema(key)
            .provisioned_throughput(throughput)
            .send()
            .await
            .map_err(StoreError::provision)?;

        self.wait_until_active().await?;

        if !ttl_enabled {
            return Ok(());
        }

        let spec = TimeToLiveSpecification::builder()
            .attribute_name(TTL_ATTR)
            .enabled(true)
            .build()
            .map_err(StoreError::provision)?;
        self.client
            .update_time_to_live()
            .table_name(&self.table_name)
            .time_to_live_specification(spec)
            .send()
            .await
            .map_err(StoreError::provision)?;

        tracing::info!("Enabled TTL on {}.{}", self.table_name, TTL_ATTR);
        Ok(())
    }

    async fn wait_until_active(&self) -> Result<(), StoreError> {
        let deadline = tokio::time::Instant::now() + ACTIVE_TIMEOUT;
        loop {
            let output = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(StoreError::provision)?;

            if output.table().and_then(|t| t.table_status()) == Some(&TableStatus::Active) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(StoreError::Provision(format!(
                    "table {} did not become active within {}s",
                    self.table_name,
                    ACTIVE_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
        }
    }
}

fn record_to_item(record: &StoredRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::from([
        (ID_ATTR.to_string(), AttributeValue::S(record.id.clone())),
        (DATA_ATTR.to_string(), AttributeValue::S(record.data.clone())),
        (
            MODIFIED_AT_ATTR.to_string(),
            AttributeValue::N(record.modified_at.to_string()),
        ),
    ]);
    if let Some(ttl) = record.ttl {
        item.insert(TTL_ATTR.to_string(), AttributeValue::N(ttl.to_string()));
    }
    item
}

fn record_from_item(item: &HashMap<String, AttributeValue>) -> Result<StoredRecord, StoreError> {
    let string_attr = |name: &str| {
        item.get(name)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("session item missing `{name}`")))
    };
    let number_attr = |name: &str| {
        item.get(name)
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok())
    };

    Ok(StoredRecord {
        id: string_attr(ID_ATTR)?,
        data: string_attr(DATA_ATTR)?,
        modified_at: number_attr(MODIFIED_AT_ATTR).unwrap_or(0),
        // Zero means no expiry was written.
        ttl: number_attr(TTL_ATTR).filter(|ttl| *ttl > 0),
    })
}

impl SessionBackend for DynamoDbBackend {
    async fn load(&self, session_id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(ID_ATTR, AttributeValue::S(session_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(StoreError::backend)?;

        match result.item() {
            Some(item) => record_from_item(item).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &StoredRecord) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record_to_item(record)))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to save session {}: {}", record.id, e);
                StoreError::backend(e)
            })?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(ID_ATTR, AttributeValue::S(session_id.to_string()))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete session {}: {}", session_id, e);
                StoreError::backend(e)
            })?;
        Ok(())
    }
}

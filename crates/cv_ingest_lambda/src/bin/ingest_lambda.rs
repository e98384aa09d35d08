use std::sync::Arc;

use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use cv_ingest_core::report::HandlerResponse;
use cv_ingest_lambda::adapters::object_store::ObjectStore;
use cv_ingest_lambda::adapters::postgres::PgRecordSink;
use cv_ingest_lambda::config::IngestConfig;
use cv_ingest_lambda::handlers::ingest::handle_ingest_event;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct S3ObjectStore {
    s3_client: aws_sdk_s3::Client,
}

impl ObjectStore for S3ObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        let client = self.s3_client.clone();
        let bucket = bucket.to_string();
        let object_key = key.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_object()
                    .bucket(&bucket)
                    .key(&object_key)
                    .send()
                    .await
                    .map_err(|error| {
                        format!("failed to read s3://{bucket}/{object_key}: {error}")
                    })?;
                output
                    .body
                    .collect()
                    .await
                    .map(|data| data.into_bytes().to_vec())
                    .map_err(|error| {
                        format!("failed to stream s3://{bucket}/{object_key}: {error}")
                    })
            })
        })
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
        let client = self.s3_client.clone();
        let bucket = bucket.to_string();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(object_key)
                    .body(ByteStream::from(body_bytes))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to write object to s3: {error}"))
            })
        })
    }
}

struct RuntimeDependencies {
    config: IngestConfig,
    object_store: S3ObjectStore,
    sink: PgRecordSink,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: Arc<RuntimeDependencies>,
) -> Result<HandlerResponse, Error> {
    let handler_config = deps
        .config
        .handler_config(Utc::now().format("%Y-%m-%d").to_string());
    Ok(handle_ingest_event(
        &event.payload,
        &handler_config,
        &deps.object_store,
        &deps.sink,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = IngestConfig::from_env().map_err(|error| Error::from(error.to_string()))?;
    let sink = PgRecordSink::connect_lazy(&config.database_url, config.db_max_connections)
        .map_err(Error::from)?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = Arc::new(RuntimeDependencies {
        config,
        object_store: S3ObjectStore {
            s3_client: aws_sdk_s3::Client::new(&aws_config),
        },
        sink,
    });

    tracing::info!(event = "runtime_started", archive_uploads = deps.config.archive_uploads);
    lambda_runtime::run(service_fn(move |event| {
        let deps = Arc::clone(&deps);
        async move { handle_request(event, deps).await }
    }))
    .await
}

//! Bucketkit CLI — upload, fetch and delete objects in a bucket.
//!
//! Configuration comes from the environment (or `.env`): S3_BUCKET, S3_REGION or
//! AWS_REGION, optional S3_ENDPOINT, STORAGE_BACKEND, LOCAL_STORAGE_PATH and DOWNLOAD_DIR.

use anyhow::Context;
use bucketkit_cli::{default_key_for, init_tracing};
use bucketkit_core::StorageConfig;
use bucketkit_storage::{create_client, ObjectUpload, StorageManager};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

#[derive(Parser)]
#[command(name = "bucketkit", about = "Object storage bucket CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Object key (defaults to the file name)
        #[arg(long)]
        key: Option<String>,
        /// Target bucket (defaults to S3_BUCKET)
        #[arg(long)]
        bucket: Option<String>,
        /// Content type stored with the object
        #[arg(long)]
        content_type: Option<String>,
        /// Make the object readable by anyone
        #[arg(long)]
        public: bool,
    },
    /// Download an object from the default bucket into DOWNLOAD_DIR
    Fetch {
        /// Object key
        key: String,
    },
    /// Write an object's bytes to stdout
    Cat {
        /// Object key
        key: String,
        /// Source bucket (defaults to S3_BUCKET)
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Delete an object
    Delete {
        /// Object key
        key: String,
        /// Bucket (defaults to S3_BUCKET)
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Report whether an object is publicly readable
    Acl {
        /// Object key
        key: String,
        /// Bucket (defaults to S3_BUCKET)
        #[arg(long)]
        bucket: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = StorageConfig::from_env().context("Load storage configuration")?;
    let client = create_client(&config)
        .await
        .context("Create storage client")?;
    let manager = StorageManager::from_config(client, &config);
    let bucket_or_default =
        |bucket: Option<String>| bucket.unwrap_or_else(|| manager.default_bucket().to_string());

    match cli.command {
        Commands::Upload {
            file,
            key,
            bucket,
            content_type,
            public,
        } => {
            let key = match key {
                Some(key) => key,
                None => default_key_for(&file).with_context(|| {
                    format!("Cannot derive a key from {}, pass --key", file.display())
                })?,
            };
            let bucket = bucket_or_default(bucket);
            let upload = ObjectUpload::from_file(&file, content_type).await?;
            manager.upload(&key, upload, &bucket, public).await?;
            println!("{}/{}", bucket, key);
        }
        Commands::Fetch { key } => {
            let path = manager.download_as_local_file(&key).await?;
            println!("{}", path.display());
        }
        Commands::Cat { key, bucket } => {
            let bucket = bucket_or_default(bucket);
            let mut object = manager.download(&key, &bucket).await?;
            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = object.body.next().await {
                stdout.write_all(&chunk?).await?;
            }
            stdout.flush().await?;
        }
        Commands::Delete { key, bucket } => {
            let bucket = bucket_or_default(bucket);
            manager.delete(&key, &bucket).await?;
            println!("deleted {}/{}", bucket, key);
        }
        Commands::Acl { key, bucket } => {
            let bucket = bucket_or_default(bucket);
            let public = manager.is_public_read(&key, &bucket).await?;
            println!("{}", if public { "public-read" } else { "private" });
        }
    }

    Ok(())
}

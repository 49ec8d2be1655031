//! Source bucket and uploads over `aws s3api` / `aws s3`.

use std::path::Path;

use async_trait::async_trait;

use agentcore_core::cloud::ObjectStore;
use agentcore_core::CloudResult;

use crate::cli::{args, AwsCli};

/// The one region where `create-bucket` rejects a location constraint.
const DEFAULT_S3_REGION: &str = "us-east-1";

fn create_bucket_args(bucket: &str, region: &str) -> Vec<String> {
    let mut argv = args(["s3api", "create-bucket", "--bucket", bucket]);
    if region != DEFAULT_S3_REGION {
        argv.push("--create-bucket-configuration".to_string());
        argv.push(format!("LocationConstraint={}", region));
    }
    argv
}

#[derive(Debug, Clone)]
pub struct S3Store {
    cli: AwsCli,
}

impl S3Store {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn create_bucket(&self, bucket: &str, region: &str) -> CloudResult<()> {
        self.cli
            .json(&create_bucket_args(bucket, region))
            .await
            .map(|_| ())
    }

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> CloudResult<()> {
        let source = path.display().to_string();
        let dest = format!("s3://{}/{}", bucket, key);
        self.cli
            .text(&args(["s3", "cp", source.as_str(), dest.as_str()]))
            .await
            .map(|_| ())
    }
}

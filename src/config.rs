use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub max_upload_bytes: usize,
    /// Base URL this proxy is reachable under. Only the in-memory store uses it,
    /// to build URLs that point back at the proxy.
    pub public_url: String,
}

#[derive(Clone)]
pub struct StorageConfig {
    pub provider: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_path_style: bool,
    pub presign_expiry_secs: u32,
}

// Keeps the secret key out of startup logs.
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("provider", &self.provider)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_region", &self.s3_region)
            .field("s3_access_key_id", &self.s3_access_key_id)
            .field("s3_secret_access_key", &self.s3_secret_access_key.as_ref().map(|_| "***"))
            .field("s3_endpoint", &self.s3_endpoint)
            .field("s3_path_style", &self.s3_path_style)
            .field("presign_expiry_secs", &self.presign_expiry_secs)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let public_url = env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        Ok(Self {
            server: ServerConfig {
                port,
                host,
                max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                    .unwrap_or_else(|_| "10485760".to_string())
                    .parse()?,
                public_url: public_url.trim_end_matches('/').to_string(),
            },
            storage: StorageConfig {
                provider: env::var("STORAGE_PROVIDER").unwrap_or_else(|_| "s3".to_string()),
                s3_bucket: env::var("AWS_BUCKET_NAME").unwrap_or_default(),
                s3_region: env::var("AWS_BUCKET_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                s3_access_key_id: env::var("AWS_ACCESS_KEY").ok(),
                s3_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
                s3_endpoint: env::var("S3_ENDPOINT").ok(),
                s3_path_style: env::var("S3_PATH_STYLE")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()?,
                presign_expiry_secs: env::var("PRESIGN_EXPIRY_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()?,
            },
        })
    }
}

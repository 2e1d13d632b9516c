use s3iam_aws::AwsBackend;
use s3iam_aws::params::{self, BackendParams};
use s3iam_core::config::{ProvisionerConfig, StaticConfigProvider};
use s3iam_core::provisioner::Provisioner;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about = "Provision S3 buckets and grant access to them through IAM users")]
struct Opt {
    /// S3 endpoint including the scheme.
    #[arg(long, env = "S3IAM_ENDPOINT")]
    endpoint: String,

    #[arg(long, env = "S3IAM_S3_PORT")]
    s3_port: String,

    #[arg(long, env = "S3IAM_IAM_PORT")]
    iam_port: String,

    #[arg(long, env = "S3IAM_ACCOUNT_NAME")]
    account_name: String,

    #[arg(long, env = "S3IAM_ACCESS_KEY")]
    access_key: String,

    #[arg(long, env = "S3IAM_SECRET_KEY", hide_env_values = true)]
    secret_key: String,

    /// Defaults to us-east-1.
    #[arg(long, env = "S3IAM_REGION", default_value = "")]
    region: String,

    /// PEM file with the endpoint's CA certificate.
    #[arg(long, env = "S3IAM_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    /// Prefix of the user name derived from a grant id.
    #[arg(long, env = "S3IAM_USER_PREFIX", default_value = "cosi-user-")]
    user_prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a bucket. An existing bucket is left as it is.
    CreateBucket {
        #[arg(long)]
        bucket: String,
    },
    /// Delete an empty bucket.
    DeleteBucket {
        #[arg(long)]
        bucket: String,
    },
    /// Grant access to a bucket and print the credential as JSON.
    Grant {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        grant_id: String,

        /// One of ro, rw, wo, lo, admin.
        #[arg(long)]
        access_mode: Option<String>,
    },
    /// Revoke a grant and delete its user.
    Revoke {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        grant_id: String,
    },
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn secret_data(opt: &Opt) -> anyhow::Result<BTreeMap<String, Vec<u8>>> {
    let mut data = BTreeMap::from([
        (params::ENDPOINT.to_owned(), opt.endpoint.clone().into_bytes()),
        (params::S3_PORT.to_owned(), opt.s3_port.clone().into_bytes()),
        (params::IAM_PORT.to_owned(), opt.iam_port.clone().into_bytes()),
        (params::ACCOUNT_NAME.to_owned(), opt.account_name.clone().into_bytes()),
        (params::ACCESS_KEY.to_owned(), opt.access_key.clone().into_bytes()),
        (params::SECRET_KEY.to_owned(), opt.secret_key.clone().into_bytes()),
        (params::REGION.to_owned(), opt.region.clone().into_bytes()),
    ]);
    if let Some(path) = &opt.tls_cert {
        data.insert(params::TLS_CERT.to_owned(), std::fs::read(path)?);
    }
    Ok(data)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    setup_tracing();

    let params = BackendParams::from_secret_data(&secret_data(&opt)?)?;
    let backend = Arc::new(AwsBackend::new(&params)?);

    let mut config = ProvisionerConfig::default();
    config.user_name_prefix.clone_from(&opt.user_prefix);
    let provisioner = Provisioner::with_config(backend, Arc::new(StaticConfigProvider::new(Arc::new(config))));

    match opt.command {
        Command::CreateBucket { bucket } => {
            let bucket_id = provisioner.create_bucket(&bucket).await?;
            println!("{bucket_id}");
        }
        Command::DeleteBucket { bucket } => {
            provisioner.delete_bucket(&bucket).await?;
            info!(bucket = %bucket, "bucket deleted");
        }
        Command::Grant {
            bucket,
            grant_id,
            access_mode,
        } => {
            let user = provisioner.principal_name(&grant_id);
            let actions = provisioner.resolve_actions(access_mode.as_deref())?;
            let cred = provisioner.grant_access(&bucket, &user, &actions).await?;

            let secret = cred.to_secret_map(&params.full_endpoint(), &params.region);
            println!("{}", serde_json::to_string_pretty(&secret)?);
        }
        Command::Revoke { bucket, grant_id } => {
            let user = provisioner.principal_name(&grant_id);
            provisioner.revoke_access(&bucket, &user).await?;
            info!(bucket = %bucket, user = %user, "access revoked");
        }
    }

    Ok(())
}

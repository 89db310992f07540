/*!
 * bucket-hub CLI
 *
 * Runs single operations against the buckets of a settings file:
 *
 * ```text
 * bucket-hub --config hub.toml ls photos/
 * bucket-hub --config hub.toml --bucket videos put clip.mp4 ./clip.mp4
 * bucket-hub --config hub.toml presign report.pdf --expires 600
 * ```
 */

use anyhow::Context;
use bucket_hub::{
    error::{HubError, EXIT_STORAGE, EXIT_SUCCESS},
    logging,
    protocol::s3::{
        DeleteMultiOptions, GetObjectOptions, HeadObjectOptions, ListUploadsQuery,
        ListV2ObjectsQuery, MultipartSource, MultipartUploadOptions, ObjectReader,
        PutObjectOptions, RequestOptions, ResumeState, SignatureMethod, SignatureUrlOptions,
        DEFAULT_CHUNK_SIZE,
    },
    OssService, Settings,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "bucket-hub")]
#[command(version, about = "Object storage operations across several buckets", long_about = None)]
struct Cli {
    /// Settings file with [logging] and [storage] sections
    #[arg(short = 'c', long = "config", value_name = "FILE", default_value = "bucket-hub.toml")]
    config: PathBuf,

    /// Bucket to operate on (defaults to the configured bucket)
    #[arg(short = 'b', long = "bucket", global = true)]
    bucket: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List objects
    Ls {
        /// Key prefix
        prefix: Option<String>,

        /// Maximum number of keys
        #[arg(long, default_value = "1000")]
        max_keys: i32,
    },

    /// Show object metadata as JSON
    Head { key: String },

    /// Write an object to stdout
    Cat { key: String },

    /// Upload a file, or stdin when no file is given
    Put {
        key: String,
        file: Option<PathBuf>,

        /// Content type of the object
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Delete one or more objects
    Rm {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Print a presigned URL
    Presign {
        key: String,

        /// Lifetime of the URL in seconds
        #[arg(long, default_value = "1800")]
        expires: u64,

        #[arg(long, value_enum, default_value = "get")]
        method: MethodArg,
    },

    /// List in-progress multipart uploads
    Uploads { prefix: Option<String> },

    /// Abort a multipart upload
    Abort { key: String, upload_id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Get,
    Put,
    Head,
    Delete,
}

impl From<MethodArg> for SignatureMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Get => SignatureMethod::Get,
            MethodArg::Put => SignatureMethod::Put,
            MethodArg::Head => SignatureMethod::Head,
            MethodArg::Delete => SignatureMethod::Delete,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<HubError>()
                .map(HubError::exit_code)
                .unwrap_or(EXIT_STORAGE)
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::from_file(&cli.config)?;
    settings.logging.verbose |= cli.verbose;
    if let Err(e) = logging::init_logging(&settings.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    runtime.block_on(async {
        let service = OssService::new(settings.storage).await?;
        execute(&service, cli.bucket, cli.command).await
    })
}

async fn execute(
    service: &OssService,
    bucket: Option<String>,
    command: Commands,
) -> anyhow::Result<()> {
    let request = RequestOptions {
        bucket: bucket.clone(),
    };

    match command {
        Commands::Ls { prefix, max_keys } => {
            let query = ListV2ObjectsQuery {
                prefix,
                max_keys: Some(max_keys),
                ..Default::default()
            };
            let listing = service.list_v2(&query, &request).await?;
            for object in &listing.objects {
                println!("{:>12}  {}", object.size, object.key);
            }
            if listing.is_truncated {
                eprintln!("(more keys available)");
            }
        }

        Commands::Head { key } => {
            let options = HeadObjectOptions {
                bucket,
                ..Default::default()
            };
            let metadata = service.head(&key, &options).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }

        Commands::Cat { key } => {
            let options = GetObjectOptions {
                bucket,
                ..Default::default()
            };
            let object = service.get(&key, None, &options).await?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(object.content.as_deref().unwrap_or_default())
                .context("failed to write to stdout")?;
            stdout.flush().context("failed to flush stdout")?;
        }

        Commands::Put {
            key,
            file,
            content_type,
        } => match file {
            Some(path) => upload_file(service, &key, &path, bucket, content_type).await?,
            None => {
                let options = PutObjectOptions {
                    bucket,
                    content_type,
                    ..Default::default()
                };
                let stdin: ObjectReader = Box::new(tokio::io::stdin());
                let output = service.put_stream(&key, stdin, &options).await?;
                println!("{}", output.etag.unwrap_or_default());
            }
        },

        Commands::Rm { keys } => {
            if let [key] = keys.as_slice() {
                service.delete(key, &request).await?;
            } else {
                let options = DeleteMultiOptions {
                    bucket,
                    quiet: true,
                };
                let output = service.delete_multi(&keys, &options).await?;
                for failure in &output.errors {
                    eprintln!(
                        "{}: {}",
                        failure.key,
                        failure.message.as_deref().unwrap_or("delete failed")
                    );
                }
            }
        }

        Commands::Presign {
            key,
            expires,
            method,
        } => {
            let options = SignatureUrlOptions {
                bucket,
                expires: Duration::from_secs(expires),
                method: method.into(),
                ..Default::default()
            };
            println!("{}", service.signature_url(&key, &options).await?);
        }

        Commands::Uploads { prefix } => {
            let query = ListUploadsQuery {
                prefix,
                ..Default::default()
            };
            let output = service.list_uploads(&query, &request).await?;
            for upload in &output.uploads {
                println!("{}  {}", upload.upload_id, upload.name);
            }
        }

        Commands::Abort { key, upload_id } => {
            service
                .abort_multipart_upload(&key, &upload_id, &request)
                .await?;
        }
    }

    Ok(())
}

/// Upload a local file, in parts when it spans more than one chunk
async fn upload_file(
    service: &OssService,
    key: &str,
    path: &Path,
    bucket: Option<String>,
    content_type: Option<String>,
) -> anyhow::Result<()> {
    let size = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?
        .len();

    if size <= DEFAULT_CHUNK_SIZE as u64 {
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?;
        let options = PutObjectOptions {
            bucket,
            content_type,
            ..Default::default()
        };
        let output = service.put(key, body, &options).await?;
        println!("{}", output.etag.unwrap_or_default());
        return Ok(());
    }

    let options = MultipartUploadOptions {
        bucket,
        content_type,
        progress: Some(Arc::new(|fraction: f64, state: &ResumeState| {
            eprint!(
                "\r{:5.1}%  {} parts",
                fraction * 100.0,
                state.completed_parts.len()
            );
        })),
        ..Default::default()
    };
    let output = service
        .multipart_upload(key, MultipartSource::File(path.to_path_buf()), &options)
        .await?;
    eprintln!();
    println!("{}", output.etag.unwrap_or_default());
    Ok(())
}

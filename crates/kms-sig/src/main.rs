use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kms_sig::error::{EXIT_INVALID_SIGNATURE, EXIT_IO, EXIT_UNEXPECTED};
use kms_sig::{AwsKeyService, EncryptionContext, KeyService, VerifyReport, sign, verify};
use tracing_subscriber::EnvFilter;

const EXIT_STATUS: &str = "\
Exit status:
  0  success
  1  invalid signature
  2  usage or configuration error
  3  local I/O error
  4  key service error
  5  unexpected error";

#[derive(Parser)]
#[command(
    name = "kms-sig",
    version,
    about = "Signs and verifies files using the AWS Key Management Service.",
    after_help = EXIT_STATUS
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// AWS region of the KMS keys. Defaults to the AWS provider chain.
    #[clap(long, env = "AWS_REGION", global = true)]
    region: Option<String>,
    /// Override the KMS endpoint (e.g. a local KMS emulator).
    #[clap(long, env = "KMS_ENDPOINT_URL", global = true)]
    endpoint_url: Option<String>,
    /// Log filter used when RUST_LOG is unset.
    #[clap(long, env = "KMS_SIG_LOG", default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Sign <file> with a KMS key and write the signature to <sig>.
    Sign {
        /// The ID, ARN or alias of the KMS key to use.
        key_id: String,
        /// The file to sign.
        file: PathBuf,
        /// The signature file.
        sig: PathBuf,
        /// Encryption context as k1=v1,k2=v2.
        #[clap(long, env = "KMS_SIG_CONTEXT")]
        context: Option<EncryptionContext>,
    },
    /// Verify <sig> over <file> and print the signing key.
    Verify {
        /// The file to verify.
        file: PathBuf,
        /// The signature file.
        sig: PathBuf,
        /// Encryption context the signature was made with, as k1=v1,k2=v2.
        #[clap(long, env = "KMS_SIG_CONTEXT")]
        context: Option<EncryptionContext>,
        /// Print the result as JSON.
        #[clap(long)]
        json: bool,
    },
    /// Print version information.
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    if let Command::Version = args.command {
        println!("version: {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let keys = AwsKeyService::from_env(args.region, args.endpoint_url).await;
    let command = args.command;

    match tokio::task::spawn_blocking(move || execute(&keys, command)).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: command task failed: {err}");
            ExitCode::from(EXIT_UNEXPECTED)
        }
    }
}

fn execute(keys: &dyn KeyService, command: Command) -> ExitCode {
    let outcome = match command {
        Command::Sign {
            key_id,
            file,
            sig,
            context,
        } => sign_file(keys, &key_id, &context.unwrap_or_default(), &file, &sig),
        Command::Verify {
            file,
            sig,
            context,
            json,
        } => verify_file(keys, &context.unwrap_or_default(), &file, &sig, json),
        Command::Version => Ok(()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code(&err);
            if code != EXIT_INVALID_SIGNATURE {
                eprintln!("error: {err:#}");
            }
            ExitCode::from(code)
        }
    }
}

fn sign_file(
    keys: &dyn KeyService,
    key_id: &str,
    context: &EncryptionContext,
    file: &Path,
    sig: &Path,
) -> Result<()> {
    let input = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let signature = sign(keys, key_id, context, input)
        .with_context(|| format!("signing {}", file.display()))?;

    // Only touch the signature file once there is something to put in it.
    fs::write(sig, &signature).with_context(|| format!("writing {}", sig.display()))?;
    Ok(())
}

fn verify_file(
    keys: &dyn KeyService,
    context: &EncryptionContext,
    file: &Path,
    sig: &Path,
    json: bool,
) -> Result<()> {
    let input = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let signature = fs::read(sig).with_context(|| format!("reading {}", sig.display()))?;

    match verify(keys, context, input, &signature) {
        Ok(key_id) => {
            if json {
                println!("{}", serde_json::to_string(&VerifyReport::valid(&key_id))?);
            } else {
                println!("valid signature from {key_id}");
            }
            Ok(())
        }
        Err(err) => {
            if err.is_invalid_signature() {
                if json {
                    println!("{}", serde_json::to_string(&VerifyReport::invalid())?);
                } else {
                    eprintln!("invalid signature");
                }
            }
            Err(anyhow::Error::new(err).context(format!("verifying {}", file.display())))
        }
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<kms_sig::Error>() {
        return err.exit_code();
    }
    if err.downcast_ref::<io::Error>().is_some() {
        return EXIT_IO;
    }
    EXIT_UNEXPECTED
}

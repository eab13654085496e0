//! SealStream CLI - Command line interface for password-encrypted containers.
//!
//! This tool encrypts and decrypts files or pipes with a password, and can
//! show a container's header without the password.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use sealstream_common::Error;
use sealstream_crypto::{
    password_fn, Container, ContainerConfig, Header, KdfLimits, KdfParams, Mode, HEADER_LEN,
};

/// Size of the plaintext buffer used when decrypting a stream.
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "sealstream")]
#[command(about = "SealStream - Password-based streaming encryption")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file or standard input.
    Encrypt {
        #[command(flatten)]
        io: IoArgs,

        /// Write a sealed (whole-message) container instead of a stream.
        #[arg(long)]
        sealed: bool,

        /// KDF strength: "interactive", "moderate", or "sensitive".
        #[arg(short, long)]
        strength: Option<String>,
    },

    /// Decrypt a container. The mode is read from its header.
    Decrypt {
        #[command(flatten)]
        io: IoArgs,
    },

    /// Show a container's header.
    Inspect {
        /// Container to inspect ("-" for standard input).
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct IoArgs {
    /// Input file ("-" or omitted for standard input).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file ("-" or omitted for standard output).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Context string bound into the container.
    #[arg(long, default_value = "")]
    context: String,

    /// Read the password from this file instead of prompting.
    #[arg(long)]
    password_file: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout may be carrying container data.
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Encrypt {
            io,
            sealed,
            strength,
        } => cmd_encrypt(&io, sealed, strength.as_deref()),

        Commands::Decrypt { io } => cmd_decrypt(&io),

        Commands::Inspect { input } => cmd_inspect(input.as_deref()),

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "sealstream", &mut io::stdout());
            Ok(())
        }
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password.into_bytes()))
}

/// Get the password from a file or the terminal.
fn read_password(password_file: Option<&Path>, confirm: bool) -> Result<Zeroizing<Vec<u8>>> {
    if let Some(path) = password_file {
        return read_password_file(path);
    }

    let password = prompt_password("Enter password: ")?;
    if confirm {
        let again = prompt_password("Confirm password: ")?;
        if *password != *again {
            anyhow::bail!("Passwords do not match");
        }
    }
    Ok(password)
}

/// Read a password file, dropping one trailing line ending.
fn read_password_file(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    let mut password = Zeroizing::new(
        fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
    );
    if password.last() == Some(&b'\n') {
        password.pop();
        if password.last() == Some(&b'\r') {
            password.pop();
        }
    }
    Ok(password)
}

/// Build the configuration from an optional file and command-line overrides.
fn load_config(path: Option<&Path>, strength: Option<&str>, sealed: bool) -> Result<ContainerConfig> {
    let mut config = match path {
        Some(path) => ContainerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ContainerConfig::default(),
    };

    if let Some(strength) = strength {
        config.kdf = KdfParams::preset(strength).with_context(|| {
            format!(
                "Invalid strength '{}'. Use: interactive, moderate, or sensitive",
                strength
            )
        })?;
    }
    if sealed {
        config.mode = Mode::Sealed;
    }

    config.validate()?;
    Ok(config)
}

fn is_stdio(path: Option<&Path>) -> bool {
    path.map_or(true, |p| p == Path::new("-"))
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    match path {
        Some(path) if !is_stdio(Some(path)) => {
            let file = fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}

/// Run `write` against the output.
///
/// A file output is written to a temporary file next to it and only moved
/// into place if `write` succeeds.
fn with_output<F>(path: Option<&Path>, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let path = match path {
        Some(path) if !is_stdio(Some(path)) => path,
        _ => {
            let mut stdout = io::stdout().lock();
            write(&mut stdout)?;
            stdout.flush()?;
            return Ok(());
        }
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Attach a hint to authentication failures.
fn explain(err: Error) -> anyhow::Error {
    if err.is_auth_failure() {
        warn!("Authentication failed");
        anyhow::Error::new(err).context("Wrong password or context, or the input was modified")
    } else {
        err.into()
    }
}

/// Encrypt the input.
fn cmd_encrypt(args: &IoArgs, sealed: bool, strength: Option<&str>) -> Result<()> {
    let config = load_config(args.config.as_deref(), strength, sealed)?;
    let container = Container::new(config)?;
    let password = read_password(args.password_file.as_deref(), true)?;
    let mut input = open_input(args.input.as_deref())?;

    info!("Encrypting ({} mode)", container.mode().as_str());
    with_output(args.output.as_deref(), |out| {
        encrypt_into(&container, &password, args.context.as_bytes(), &mut input, out)
    })?;

    info!("Encryption complete");
    Ok(())
}

fn encrypt_into(
    container: &Container,
    password: &[u8],
    context: &[u8],
    input: &mut dyn Read,
    out: &mut dyn Write,
) -> Result<()> {
    match container.mode() {
        Mode::Sealed => {
            let mut plaintext = Vec::new();
            input
                .read_to_end(&mut plaintext)
                .context("Failed to read input")?;
            let data = container.encrypt(password, &plaintext, context)?;
            out.write_all(&data)?;
        }
        Mode::Streaming => {
            let mut enc = container
                .encryptor(out, password_fn(password))?
                .with_context(context);
            let bytes = io::copy(input, &mut enc).context("Failed to encrypt input")?;
            enc.close()?;
            debug!(bytes, "Encrypted stream");
        }
    }
    Ok(())
}

/// Decrypt the input.
fn cmd_decrypt(args: &IoArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), None, false)?;
    let mut input = BufReader::new(open_input(args.input.as_deref())?);
    let mode = detect_mode(&mut input)?;
    let container = Container::new(ContainerConfig { mode, ..config })?;
    let password = read_password(args.password_file.as_deref(), false)?;

    info!("Decrypting ({} mode)", mode.as_str());
    with_output(args.output.as_deref(), |out| {
        decrypt_into(&container, &password, args.context.as_bytes(), &mut input, out)
    })?;

    info!("Decryption complete");
    Ok(())
}

/// Peek at the version byte without consuming it.
fn detect_mode(input: &mut impl BufRead) -> Result<Mode> {
    let buf = input.fill_buf().context("Failed to read input")?;
    let version = *buf.first().context("Input is empty")?;
    Mode::from_version(version).with_context(|| format!("Unknown container version {}", version))
}

fn decrypt_into(
    container: &Container,
    password: &[u8],
    context: &[u8],
    input: &mut dyn Read,
    out: &mut dyn Write,
) -> Result<()> {
    match container.mode() {
        Mode::Sealed => {
            let mut data = Vec::new();
            input.read_to_end(&mut data).context("Failed to read input")?;
            let plaintext = container
                .decrypt(password, &data, context)
                .map_err(explain)?;
            out.write_all(&plaintext)?;
        }
        Mode::Streaming => {
            let mut dec = container
                .decryptor(input, password_fn(password))?
                .with_context(context);
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let chunk = dec.pull(&mut buf).map_err(explain)?;
                out.write_all(&buf[..chunk.len])?;
                if chunk.eof {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Show a container's header.
fn cmd_inspect(input: Option<&Path>) -> Result<()> {
    let mut input = open_input(input)?;
    let mut buf = [0u8; HEADER_LEN];
    input
        .read_exact(&mut buf)
        .context("Input is too short to hold a header")?;

    let header = Header::parse(&buf)?;
    print!("{}", describe(&header, &KdfLimits::default()));
    Ok(())
}

fn describe(header: &Header, limits: &KdfLimits) -> String {
    let params = header.kdf_params();
    let mut out = String::new();
    out.push_str("SealStream Container\n");
    out.push_str("====================\n");
    out.push_str(&format!(
        "Mode:        {} (version {})\n",
        header.mode().as_str(),
        header.version()
    ));
    out.push_str(&format!("Time cost:   {}\n", params.time_cost));
    out.push_str(&format!("Memory cost: {} KiB\n", params.memory_cost));
    out.push_str(&format!("Parallelism: {}\n", params.parallelism));
    out.push_str(&format!("Salt:        {}\n", STANDARD.encode(header.salt())));
    out.push_str(&format!("IV:          {}\n", STANDARD.encode(header.iv())));
    if let Err(e) = limits.check(params) {
        out.push_str(&format!("Warning:     {}\n", e));
    }
    out
}

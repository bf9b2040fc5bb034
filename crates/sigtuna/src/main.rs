#![forbid(unsafe_code)]

//! sigtuna CLI: sign, verify and inspect SAML documents.

use base64::Engine;
use clap::{Parser, Subcommand};
use sigtuna::{init, Error, InitOptions, Key, Runtime, SignOptions, TransformId, VerifyOutcome};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sigtuna",
    about = "sigtuna: SAML XML-Signature signing, verification and inspection",
    version
)]
struct Cli {
    /// Base directory for relative key and certificate paths
    #[arg(long, global = true)]
    resource_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Trace the canonical octets fed to digests and signatures
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an enveloped signature to a SAML document
    Sign {
        /// Input XML file
        file: PathBuf,

        /// Private key (PEM or DER)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Certificate to embed in KeyInfo
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Name for the key, emitted as KeyName
        #[arg(long = "key-name")]
        key_name: Option<String>,

        /// Raw HMAC key (binary file)
        #[arg(long = "hmac-key")]
        hmac_key: Option<PathBuf>,

        /// Signature algorithm name or URI
        #[arg(short, long, default_value = "rsa-sha256")]
        algorithm: String,

        /// ID attribute name
        #[arg(long = "id-attr")]
        id_attr: Option<String>,

        /// Insert the signature after this element (NAMESPACE LOCALNAME)
        #[arg(long = "insert-after", num_args = 2, value_names = ["NAMESPACE", "LOCALNAME"])]
        insert_after: Option<Vec<String>>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify the enveloped signature of a SAML document
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Trusted certificate (repeatable)
        #[arg(long)]
        cert: Vec<PathBuf>,

        /// Trusted key (repeatable)
        #[arg(short = 'k', long)]
        key: Vec<PathBuf>,

        /// Trusted HMAC key (binary file)
        #[arg(long = "hmac-key")]
        hmac_key: Option<PathBuf>,

        /// ID attribute name
        #[arg(long = "id-attr")]
        id_attr: Option<String>,
    },

    /// Print Issuer, SessionIndex and attributes as JSON
    Attrs {
        /// Input XML file
        file: PathBuf,
    },

    /// Validate a document against the bundled SAML 2.0 schemas
    Validate {
        /// Input XML file
        file: PathBuf,
    },

    /// Sign raw bytes, printing the base64 signature
    SignBinary {
        /// Data file
        file: PathBuf,

        /// Private key (PEM or DER)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Raw HMAC key (binary file)
        #[arg(long = "hmac-key")]
        hmac_key: Option<PathBuf>,

        /// Signature algorithm name or URI
        #[arg(short, long, default_value = "rsa-sha256")]
        algorithm: String,
    },

    /// Verify a raw signature over a file
    VerifyBinary {
        /// Data file
        file: PathBuf,

        /// Signature file (raw bytes)
        #[arg(short, long)]
        signature: PathBuf,

        /// Key or certificate (PEM or DER)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Raw HMAC key (binary file)
        #[arg(long = "hmac-key")]
        hmac_key: Option<PathBuf>,

        /// Signature algorithm name or URI
        #[arg(short, long, default_value = "rsa-sha256")]
        algorithm: String,
    },

    /// List supported algorithms
    Info,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("sigtuna=trace")
    } else if cli.verbose {
        EnvFilter::new("sigtuna=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sigtuna=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut options = InitOptions::new().with_debug(cli.debug);
    if let Some(dir) = cli.resource_dir {
        options = options.with_resource_dir(dir);
    }
    let result = init(options).and_then(|rt| {
        let outcome = run(&rt, cli.command);
        rt.shutdown()?;
        outcome
    });

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Run one command; `Ok(false)` reports a negative verdict.
fn run(rt: &Runtime, command: Commands) -> Result<bool, Error> {
    match command {
        Commands::Sign {
            file,
            key,
            cert,
            key_name,
            hmac_key,
            algorithm,
            id_attr,
            insert_after,
            output,
        } => {
            let mut key = signing_key(rt, key, hmac_key)?;
            if let Some(cert) = cert {
                rt.attach_cert_file(&mut key, cert)?;
            }
            if let Some(name) = key_name {
                key = key.with_name(name);
            }
            let transform = transform(rt, &algorithm)?;
            let mut opts = SignOptions::new();
            if let Some(attr) = id_attr {
                opts = opts.with_id_attr(attr);
            }
            if let Some([namespace, local_name]) = insert_after.as_deref() {
                opts = opts.with_insert_after(namespace, local_name);
            }
            let xml = read_file(&file)?;
            let signed = rt.sign_xml_text(&key, transform, &xml, &opts)?;
            write_output(output, signed.as_bytes())?;
            Ok(true)
        }

        Commands::Verify {
            file,
            cert,
            key,
            hmac_key,
            id_attr,
        } => {
            let mut keys = Vec::new();
            for path in cert {
                keys.push(rt.load_cert_file(path)?);
            }
            for path in key {
                keys.push(rt.load_key_file(path)?);
            }
            if let Some(path) = hmac_key {
                keys.push(rt.load_hmac_key(&read_bytes(&path)?)?);
            }
            let manager = rt.create_keys_manager(keys)?;
            let mut doc = parse_file(rt, &file)?;
            let mut opts = SignOptions::new();
            if let Some(attr) = id_attr {
                opts = opts.with_id_attr(attr);
            }
            let outcome = rt.verify_document(&manager, &mut doc, &opts)?;
            Ok(report(outcome))
        }

        Commands::Attrs { file } => {
            let doc = parse_file(rt, &file)?;
            let summary = serde_json::json!({
                "issuer": rt.issuer(&doc),
                "session_index": rt.session_index(&doc),
                "attributes": rt.attributes(&doc)?,
            });
            let text = serde_json::to_string_pretty(&summary)
                .map_err(|e| Error::Other(format!("json: {e}")))?;
            println!("{text}");
            Ok(true)
        }

        Commands::Validate { file } => {
            let doc = parse_file(rt, &file)?;
            let valid = rt.validate_document(&doc);
            println!("{}", if valid { "valid" } else { "invalid" });
            Ok(valid)
        }

        Commands::SignBinary {
            file,
            key,
            hmac_key,
            algorithm,
        } => {
            let key = signing_key(rt, key, hmac_key)?;
            let transform = transform(rt, &algorithm)?;
            let signature = rt.sign_binary(&key, transform, &read_bytes(&file)?)?;
            println!("{}", base64::engine::general_purpose::STANDARD.encode(signature));
            Ok(true)
        }

        Commands::VerifyBinary {
            file,
            signature,
            key,
            hmac_key,
            algorithm,
        } => {
            let key = match (key, hmac_key) {
                (_, Some(path)) => rt.load_hmac_key(&read_bytes(&path)?)?,
                (Some(path), None) => rt
                    .load_cert_file(&path)
                    .or_else(|_| rt.load_key_file(&path))?,
                (None, None) => return Err(Error::Other("a --key or --hmac-key is required".into())),
            };
            let transform = transform(rt, &algorithm)?;
            let outcome = rt.verify_binary(&key, transform, &read_bytes(&file)?, &read_bytes(&signature)?)?;
            Ok(report(outcome))
        }

        Commands::Info => {
            cmd_info();
            Ok(true)
        }
    }
}

fn cmd_info() {
    println!("sigtuna: SAML XML-Signature library");
    println!();
    println!("Supported signature and digest algorithms:");
    for t in TransformId::all() {
        println!("  {:<16} {}", t.name(), t.uri());
    }
    println!();
    println!("Supported canonicalization:");
    println!("  C14N 1.0 (±comments)");
    println!("  C14N 1.1 (±comments)");
    println!("  Exclusive C14N 1.0 (±comments)");
    println!();
    println!("Supported key formats:");
    println!("  PEM (PKCS#8, PKCS#1, SEC1, SPKI), DER (RSA, EC), raw binary (HMAC)");
}

// ── Utility functions ────────────────────────────────────────────────

fn report(outcome: VerifyOutcome) -> bool {
    match outcome {
        VerifyOutcome::Valid => println!("OK"),
        VerifyOutcome::Invalid => println!("INVALID"),
    }
    outcome.is_valid()
}

fn signing_key(rt: &Runtime, key: Option<PathBuf>, hmac_key: Option<PathBuf>) -> Result<Key, Error> {
    match (key, hmac_key) {
        (Some(path), _) => rt.load_key_file(path),
        (None, Some(path)) => rt.load_hmac_key(&read_bytes(&path)?),
        (None, None) => Err(Error::Other("a --key or --hmac-key is required".into())),
    }
}

fn transform(rt: &Runtime, algorithm: &str) -> Result<TransformId, Error> {
    TransformId::by_name(algorithm)
        .or_else(|| rt.resolve_transform(algorithm))
        .ok_or_else(|| Error::UnsupportedAlgorithm(algorithm.to_owned()))
}

fn parse_file(rt: &Runtime, path: &PathBuf) -> Result<sigtuna::Document, Error> {
    rt.parse(&read_bytes(path)?)
        .ok_or_else(|| Error::XmlParse(format!("{}: not well-formed XML", path.display())))
}

fn read_file(path: &PathBuf) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}

fn read_bytes(path: &PathBuf) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => std::fs::write(&p, data).map_err(|e| Error::Other(format!("{}: {e}", p.display()))),
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(data)
                .map_err(|e| Error::Other(format!("stdout: {e}")))
        }
    }
}

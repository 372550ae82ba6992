//! Signing utility for Glycorisk model artifacts.
//!
//! # Usage
//!
//! ```bash
//! sign_models keygen --out-seed <path> [--out-pub <path>] [--force]
//! sign_models sign <model_dir> [--nonce-b64 <b64>]
//! ```
//!
//! `keygen` writes a base64 Ed25519 seed (mode 0600) and optionally the base64
//! public key. `sign` hashes the column file and every model file present,
//! writes `manifest.json` and its raw signature `models.sig`.
//!
//! The signing seed is read from, in order: the file descriptor in
//! `GLYCORISK_MODEL_SIGNING_KEY_B64_FD`, the file in
//! `GLYCORISK_MODEL_SIGNING_KEY_B64_FILE`, the Docker secret, and (debug
//! builds only) `GLYCORISK_MODEL_SIGNING_KEY_B64`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(unix)]
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use glycorisk::adapters::sklearn::manifest::{
    sha256_hex, unix_now, SignedManifest, MANIFEST_FILE, MANIFEST_VERSION, SIGNATURE_FILE,
};
use glycorisk::adapters::sklearn::COLUMNS_FILE;
use glycorisk::domain::ModelId;

const KEY_FD_ENV: &str = "GLYCORISK_MODEL_SIGNING_KEY_B64_FD";
const KEY_FILE_ENV: &str = "GLYCORISK_MODEL_SIGNING_KEY_B64_FILE";
const KEY_ENV: &str = "GLYCORISK_MODEL_SIGNING_KEY_B64";
const DOCKER_SECRET_PATH: &str = "/run/secrets/glycorisk_model_signing_key_b64";

const USAGE: &str = "Usage:
  sign_models keygen --out-seed <path> [--out-pub <path>] [--force]
  sign_models sign <model_dir> [--nonce-b64 <b64_16_bytes>]";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn non_empty_secret(raw: &str) -> Result<Zeroizing<String>> {
    let secret = raw.trim_end_matches(['\n', '\r']).to_string();
    if secret.is_empty() {
        bail!("Empty signing key");
    }
    Ok(Zeroizing::new(secret))
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>> {
    #[cfg(unix)]
    if let Ok(fd_str) = env::var(KEY_FD_ENV) {
        let fd: i32 = fd_str.trim().parse().context("Invalid key FD")?;
        if fd <= 2 {
            bail!("Refusing to read signing key from stdio FD");
        }
        // SAFETY: the FD is handed to this process for a one-time secret read.
        let mut file = unsafe { fs::File::from_raw_fd(fd) };
        let mut buf = Zeroizing::new(String::new());
        std::io::Read::read_to_string(&mut file, &mut buf)
            .context("Failed reading signing key from FD")?;
        return non_empty_secret(&buf);
    }

    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
        );
        return non_empty_secret(&content);
    }

    if Path::new(DOCKER_SECRET_PATH).exists() {
        let content = Zeroizing::new(
            fs::read_to_string(DOCKER_SECRET_PATH).context("Failed reading docker secret")?,
        );
        return non_empty_secret(&content);
    }

    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_ENV) {
            return non_empty_secret(&v);
        }
    }

    Err(anyhow!(
        "Missing signing key. Provide {KEY_FD_ENV}, {KEY_FILE_ENV} or {DOCKER_SECRET_PATH} ({KEY_ENV} only in debug builds)."
    ))
}

fn read_signing_seed() -> Result<Seed> {
    let b64 = read_signing_seed_b64()?;
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.trim())
            .context("Invalid base64 in signing key")?,
    );
    if raw.len() != 32 {
        bail!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }
    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

fn make_nonce_b64() -> String {
    let mut nonce = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    general_purpose::STANDARD.encode(nonce)
}

fn validate_nonce_b64(nonce_b64: &str) -> Result<()> {
    let raw = general_purpose::STANDARD
        .decode(nonce_b64.trim())
        .context("Invalid base64 nonce")?;
    if raw.len() != 16 {
        bail!("nonce must decode to exactly 16 bytes");
    }
    Ok(())
}

/// Create a file, refusing to overwrite unless `force`.
fn create_output(path: &Path, mode: u32, force: bool) -> Result<fs::File> {
    if path.exists() && !force {
        bail!("Refusing to overwrite existing file {path:?}. Use --force.");
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {parent:?}"))?;
    }

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    opts.open(path)
        .with_context(|| format!("Failed to open {path:?}"))
}

fn path_arg(args: &mut impl Iterator<Item = String>) -> Result<PathBuf> {
    args.next().map(PathBuf::from).ok_or_else(|| anyhow!(USAGE))
}

fn keygen(mut args: impl Iterator<Item = String>) -> Result<()> {
    let mut out_seed: Option<PathBuf> = None;
    let mut out_pub: Option<PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out-seed" => out_seed = Some(path_arg(&mut args)?),
            "--out-pub" => out_pub = Some(path_arg(&mut args)?),
            "--force" => force = true,
            _ => bail!("Unknown arg: {arg}\n{USAGE}"),
        }
    }
    let out_seed = out_seed.ok_or_else(|| anyhow!(USAGE))?;

    let mut seed = Seed([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut seed.0);
    let verifying_key = SigningKey::from_bytes(&seed.0).verifying_key();
    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));

    let mut file = create_output(&out_seed, 0o600, force)?;
    file.write_all(seed_b64.as_bytes())?;
    file.write_all(b"\n")?;
    println!("Wrote signing seed (base64) to {out_seed:?}");

    if let Some(pub_path) = &out_pub {
        let mut pub_file = create_output(pub_path, 0o644, force)?;
        let pub_b64 = general_purpose::STANDARD.encode(verifying_key.as_bytes());
        pub_file.write_all(pub_b64.as_bytes())?;
        pub_file.write_all(b"\n")?;
        println!("Wrote public key (base64) to {pub_path:?}");
    }

    println!("PUBKEY (hex)={}", to_hex(verifying_key.as_bytes()));
    Ok(())
}

fn sign(mut args: impl Iterator<Item = String>) -> Result<()> {
    let mut model_dir: Option<PathBuf> = None;
    let mut nonce_arg: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--nonce-b64" => nonce_arg = Some(args.next().ok_or_else(|| anyhow!(USAGE))?),
            _ if model_dir.is_none() => model_dir = Some(PathBuf::from(arg)),
            _ => bail!(USAGE),
        }
    }
    let model_dir = model_dir.ok_or_else(|| anyhow!(USAGE))?;

    let mut files = BTreeMap::new();
    let candidates =
        std::iter::once(COLUMNS_FILE).chain(ModelId::ALL.iter().map(ModelId::file_name));
    for name in candidates {
        let path = model_dir.join(name);
        if path.exists() {
            let bytes = fs::read(&path).with_context(|| format!("Failed to read {path:?}"))?;
            files.insert(name.to_string(), sha256_hex(&bytes));
        }
    }
    if !files.contains_key(COLUMNS_FILE) {
        bail!("{COLUMNS_FILE} not found in {model_dir:?}");
    }
    if files.len() == 1 {
        bail!("No model file found in {model_dir:?}");
    }

    let nonce_b64 = match nonce_arg {
        Some(v) => {
            validate_nonce_b64(&v)?;
            v
        }
        None => make_nonce_b64(),
    };

    let manifest = SignedManifest {
        version: MANIFEST_VERSION,
        created_at: unix_now(),
        nonce_b64,
        files,
    };
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("Failed to serialize manifest")?;

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    let signature: Signature = signing_key.sign(&manifest_bytes);

    let manifest_path = model_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .with_context(|| format!("Failed to write {manifest_path:?}"))?;
    let sig_path = model_dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, signature.to_bytes())
        .with_context(|| format!("Failed to write {sig_path:?}"))?;

    println!("Signed {} file(s): {manifest_path:?}", manifest.files.len());
    println!("Wrote signature: {sig_path:?}");
    println!(
        "PUBKEY (hex)={}",
        to_hex(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("keygen") => keygen(args),
        Some("sign") => sign(args),
        Some("-h" | "--help") => {
            println!("{USAGE}");
            Ok(())
        }
        _ => bail!(USAGE),
    }
}

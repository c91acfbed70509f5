use std::path::{Path, PathBuf};

use num_bigint::BigUint;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{QrShareError, Result};
use crate::qr::{decode_value, encode_value, format_payload, render, save, QrOptions};
use crate::sss::{combine, split_with_rng};

pub const DEFAULT_SECRET: u64 = 8786546;
pub const DEFAULT_NUM_SHARES: usize = 15;
pub const COMBINED_FILE_NAME: &str = "secret_combined.png";

#[derive(Debug, Clone)]
pub struct Parameters {
    pub secret: BigUint,
    pub num_shares: usize,
    pub out_dir: PathBuf,
    pub qr: QrOptions,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            secret: BigUint::from(DEFAULT_SECRET),
            num_shares: DEFAULT_NUM_SHARES,
            out_dir: PathBuf::from("."),
            qr: QrOptions::default(),
        }
    }
}

/// Shares written to disk, in share order.
#[derive(Debug, Clone)]
pub struct ShareFiles {
    pub shares: Vec<BigUint>,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub secret: String,
    pub shares: Vec<String>,
    pub combined: String,
    pub matched: bool,
    pub artifacts: Vec<PathBuf>,
}

/// Path of the 1-based `index`-th share image.
pub fn share_path(out_dir: &Path, index: usize) -> PathBuf {
    out_dir.join(format!("share_{}.png", index))
}

pub fn combined_path(out_dir: &Path) -> PathBuf {
    out_dir.join(COMBINED_FILE_NAME)
}

pub fn split_to_files(
    secret: &BigUint,
    num_shares: usize,
    out_dir: &Path,
    options: &QrOptions,
) -> Result<ShareFiles> {
    split_to_files_with_rng(secret, num_shares, out_dir, options, &mut OsRng)
}

pub fn split_to_files_with_rng<R: RngCore + CryptoRng + ?Sized>(
    secret: &BigUint,
    num_shares: usize,
    out_dir: &Path,
    options: &QrOptions,
    rng: &mut R,
) -> Result<ShareFiles> {
    // Reject bad options before anything random is drawn or written.
    options.validate()?;
    let shares = split_with_rng(secret, num_shares, rng)?;

    // Every share must render before any file is written.
    let images = shares
        .iter()
        .map(|share| render(&format_payload(share), options))
        .collect::<Result<Vec<_>>>()?;

    std::fs::create_dir_all(out_dir)?;
    let mut paths = Vec::with_capacity(images.len());
    for (i, img) in images.iter().enumerate() {
        let path = share_path(out_dir, i + 1);
        if let Err(e) = save(img, &path) {
            remove_written(&paths);
            return Err(e);
        }
        debug!(index = i + 1, path = %path.display(), "encoded share");
        paths.push(path);
    }
    info!(count = shares.len(), dir = %out_dir.display(), "wrote share images");

    Ok(ShareFiles { shares, paths })
}

fn remove_written(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove partial share image");
        }
    }
}

/// Decodes every share image and XOR-folds the results. Any unreadable share aborts.
pub fn combine_files<P: AsRef<Path>>(paths: &[P]) -> Result<BigUint> {
    if paths.is_empty() {
        return Err(QrShareError::InvalidArgument(
            "no share images given".to_string(),
        ));
    }
    let shares = read_shares(paths)?;
    Ok(combine(&shares))
}

pub fn read_shares<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<BigUint>> {
    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let share = decode_value(path.as_ref())?;
            debug!(index = i + 1, path = %path.as_ref().display(), "decoded share");
            Ok(share)
        })
        .collect()
}

//Split, encode, decode, combine and compare
pub fn run(params: &Parameters) -> Result<RunReport> {
    run_with_rng(params, &mut OsRng)
}

pub fn run_with_rng<R: RngCore + CryptoRng + ?Sized>(
    params: &Parameters,
    rng: &mut R,
) -> Result<RunReport> {
    info!(num_shares = params.num_shares, "splitting secret");
    let written = split_to_files_with_rng(
        &params.secret,
        params.num_shares,
        &params.out_dir,
        &params.qr,
        rng,
    )?;

    let read_back = read_shares(&written.paths)?;
    let combined = combine(&read_back);
    let matched = combined == params.secret;
    if matched {
        info!("combined secret matches original");
    } else {
        warn!("combined secret does not match original");
    }

    let combined_file = combined_path(&params.out_dir);
    encode_value(&combined, &combined_file, &params.qr)?;

    let mut artifacts = written.paths;
    artifacts.push(combined_file);

    Ok(RunReport {
        secret: format_payload(&params.secret),
        shares: written.shares.iter().map(format_payload).collect(),
        combined: format_payload(&combined),
        matched,
        artifacts,
    })
}

//! QR rendering and scanning for share payloads.
//!
//! Shares travel as base-10 digit strings. Encoding builds the module matrix with
//! `qrcode` and rasterises it into a greyscale PNG; decoding loads the image and
//! hands the luma plane to `rqrr`.

use std::path::Path;

use image::{GrayImage, Luma};
use num_bigint::BigUint;
use qrcode::{Color, EcLevel, QrCode, Version};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DecodeError, QrShareError, Result};

pub const MIN_SYMBOL_VERSION: i16 = 1;
pub const MAX_SYMBOL_VERSION: i16 = 40;
pub const MAX_MODULE_SIZE: u32 = 64;
pub const MAX_BORDER: u32 = 64;
/// Largest rendered side in pixels.
pub const MAX_IMAGE_SIDE: u32 = 16_384;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolVersion {
    /// Exactly this version; payloads that do not fit are an error.
    Fixed(i16),
    /// Smallest version at or above `min` that holds the payload.
    AutoFit { min: i16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrOptions {
    pub error_correction: ErrorCorrection,
    /// Pixels per module side.
    pub module_size: u32,
    /// Quiet zone width in modules.
    pub border: u32,
    pub version: SymbolVersion,
}

impl Default for QrOptions {
    fn default() -> Self {
        QrOptions {
            error_correction: ErrorCorrection::L,
            module_size: 10,
            border: 4,
            version: SymbolVersion::AutoFit { min: 3 },
        }
    }
}

impl QrOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_MODULE_SIZE).contains(&self.module_size) {
            return Err(QrShareError::InvalidArgument(format!(
                "module size must be within 1..={} pixels, got {}",
                MAX_MODULE_SIZE, self.module_size
            )));
        }
        if self.border > MAX_BORDER {
            return Err(QrShareError::InvalidArgument(format!(
                "border must be at most {} modules, got {}",
                MAX_BORDER, self.border
            )));
        }
        let v = match self.version {
            SymbolVersion::Fixed(v) => v,
            SymbolVersion::AutoFit { min } => min,
        };
        if !(MIN_SYMBOL_VERSION..=MAX_SYMBOL_VERSION).contains(&v) {
            return Err(QrShareError::InvalidArgument(format!(
                "symbol version must be within {}..={}, got {}",
                MIN_SYMBOL_VERSION, MAX_SYMBOL_VERSION, v
            )));
        }
        Ok(())
    }
}

fn build_code(payload: &str, options: &QrOptions) -> Result<QrCode> {
    let ec = EcLevel::from(options.error_correction);
    match options.version {
        SymbolVersion::Fixed(v) => QrCode::with_version(payload, Version::Normal(v), ec)
            .map_err(|e| QrShareError::Encode(format!("version {}: {}", v, e))),
        SymbolVersion::AutoFit { min } => {
            let mut last = None;
            for v in min..=MAX_SYMBOL_VERSION {
                match QrCode::with_version(payload, Version::Normal(v), ec) {
                    Ok(code) => return Ok(code),
                    Err(e) => last = Some(e),
                }
            }
            Err(QrShareError::Encode(match last {
                Some(e) => format!("payload does not fit any version from {}: {}", min, e),
                None => format!("no symbol version at or above {}", min),
            }))
        }
    }
}

/// Rasterises `payload` as a QR symbol into a greyscale image.
pub fn render(payload: &str, options: &QrOptions) -> Result<GrayImage> {
    options.validate()?;
    let code = build_code(payload, options)?;

    let width = code.width() as u32;
    let side = (width + 2 * options.border) * options.module_size;
    if side > MAX_IMAGE_SIDE {
        return Err(QrShareError::InvalidArgument(format!(
            "rendered image would be {} pixels wide, limit is {}",
            side, MAX_IMAGE_SIDE
        )));
    }

    let mut img = GrayImage::from_pixel(side, side, LIGHT);
    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let mx = i as u32 % width + options.border;
        let my = i as u32 / width + options.border;
        for dy in 0..options.module_size {
            for dx in 0..options.module_size {
                img.put_pixel(
                    mx * options.module_size + dx,
                    my * options.module_size + dy,
                    DARK,
                );
            }
        }
    }
    Ok(img)
}

/// Encodes `payload` and writes it as a PNG at `destination`.
pub fn encode(payload: &str, destination: &Path, options: &QrOptions) -> Result<()> {
    let img = render(payload, options)?;
    save(&img, destination)
}

/// Writes a rendered symbol as a PNG.
pub fn save(img: &GrayImage, destination: &Path) -> Result<()> {
    img.save(destination)
        .map_err(|e| QrShareError::Image(format!("{}: {}", destination.display(), e)))?;
    debug!(path = %destination.display(), "wrote qr image");
    Ok(())
}

/// Locates exactly one QR symbol in `img` and returns its text.
pub fn scan(img: &GrayImage) -> std::result::Result<String, DecodeError> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        img.width() as usize,
        img.height() as usize,
        |x, y| img.get_pixel(x as u32, y as u32).0[0],
    );
    let grids = prepared.detect_grids();
    match grids.len() {
        0 => Err(DecodeError::NoSymbol),
        1 => grids[0]
            .decode()
            .map(|(_, content)| content)
            .map_err(|e| DecodeError::Malformed(format!("{:?}", e))),
        n => Err(DecodeError::MultipleSymbols(n)),
    }
}

/// Reads the image at `source` and returns the payload of its single QR symbol.
pub fn decode(source: &Path) -> Result<String> {
    let img = image::open(source)
        .map_err(|e| QrShareError::decode(source, DecodeError::Unreadable(e.to_string())))?
        .to_luma8();
    let payload = scan(&img).map_err(|e| QrShareError::decode(source, e))?;
    debug!(path = %source.display(), "decoded qr image");
    Ok(payload)
}

pub fn format_payload(value: &BigUint) -> String {
    value.to_str_radix(10)
}

/// Parses a base-10 payload. Signs, whitespace and digit separators are rejected.
pub fn parse_payload(payload: &str) -> Result<BigUint> {
    if payload.is_empty() || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QrShareError::InvalidPayload(payload.to_string()));
    }
    BigUint::parse_bytes(payload.as_bytes(), 10)
        .ok_or_else(|| QrShareError::InvalidPayload(payload.to_string()))
}

pub fn encode_value(value: &BigUint, destination: &Path, options: &QrOptions) -> Result<()> {
    encode(&format_payload(value), destination, options)
}

pub fn decode_value(source: &Path) -> Result<BigUint> {
    parse_payload(&decode(source)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::imageops;

    #[test]
    fn payload_parsing_is_strict() {
        assert_eq!(parse_payload("8786546").unwrap(), BigUint::from(8786546u32));
        assert_eq!(parse_payload("0").unwrap(), BigUint::from(0u32));
        for bad in ["", "+1", "-1", " 12", "12 ", "1_000", "0x10", "12a"] {
            assert!(
                matches!(parse_payload(bad), Err(QrShareError::InvalidPayload(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn default_render_geometry() {
        // version 3 is 29 modules wide, plus a 4 module border each side
        let img = render("8786546", &QrOptions::default()).unwrap();
        assert_eq!(img.width(), (29 + 8) * 10);
        assert_eq!(img.height(), img.width());
        assert_eq!(*img.get_pixel(0, 0), LIGHT);
        assert_eq!(*img.get_pixel(40, 40), DARK);
    }

    #[test]
    fn auto_fit_grows_past_minimum() {
        let payload = "9".repeat(400);
        let img = render(&payload, &QrOptions::default()).unwrap();
        assert!(img.width() > (29 + 8) * 10);
        assert_eq!(scan(&img).unwrap(), payload);
    }

    #[test]
    fn fixed_version_overflow_is_encode_error() {
        let options = QrOptions {
            version: SymbolVersion::Fixed(1),
            ..QrOptions::default()
        };
        let err = render(&"1".repeat(200), &options).unwrap_err();
        assert!(matches!(err, QrShareError::Encode(_)));
    }

    #[test]
    fn invalid_options_rejected() {
        let zero_module = QrOptions {
            module_size: 0,
            ..QrOptions::default()
        };
        assert!(matches!(
            render("1", &zero_module),
            Err(QrShareError::InvalidArgument(_))
        ));
        let huge_border = QrOptions {
            border: 2_000_000,
            module_size: 1,
            ..QrOptions::default()
        };
        assert!(matches!(
            render("1", &huge_border),
            Err(QrShareError::InvalidArgument(_))
        ));
        let huge_module = QrOptions {
            module_size: 100_000,
            ..QrOptions::default()
        };
        assert!(matches!(
            render("1", &huge_module),
            Err(QrShareError::InvalidArgument(_))
        ));
        // each bound alone is fine, the combined side is not
        let too_wide = QrOptions {
            module_size: MAX_MODULE_SIZE,
            border: MAX_BORDER,
            version: SymbolVersion::Fixed(MAX_SYMBOL_VERSION),
            ..QrOptions::default()
        };
        assert!(matches!(
            render("1", &too_wide),
            Err(QrShareError::InvalidArgument(_))
        ));
        let bad_version = QrOptions {
            version: SymbolVersion::AutoFit { min: 41 },
            ..QrOptions::default()
        };
        assert!(matches!(
            render("1", &bad_version),
            Err(QrShareError::InvalidArgument(_))
        ));
    }

    #[test]
    fn scan_round_trip_all_levels() {
        for level in [
            ErrorCorrection::L,
            ErrorCorrection::M,
            ErrorCorrection::Q,
            ErrorCorrection::H,
        ] {
            let options = QrOptions {
                error_correction: level,
                module_size: 6,
                ..QrOptions::default()
            };
            let img = render("123456789012345678901234567890", &options).unwrap();
            assert_eq!(scan(&img).unwrap(), "123456789012345678901234567890");
        }
    }

    #[test]
    fn blank_image_has_no_symbol() {
        let img = GrayImage::from_pixel(200, 200, LIGHT);
        assert_eq!(scan(&img), Err(DecodeError::NoSymbol));
    }

    #[test]
    fn two_symbols_rejected() {
        let a = render("111", &QrOptions::default()).unwrap();
        let b = render("222", &QrOptions::default()).unwrap();
        let mut canvas = GrayImage::from_pixel(a.width() * 2, a.height(), LIGHT);
        imageops::overlay(&mut canvas, &a, 0, 0);
        imageops::overlay(&mut canvas, &b, a.width() as i64, 0);
        assert!(matches!(scan(&canvas), Err(DecodeError::MultipleSymbols(n)) if n >= 2));
    }

    #[test]
    fn corrupted_data_modules_are_malformed() {
        let options = QrOptions {
            version: SymbolVersion::Fixed(3),
            ..QrOptions::default()
        };
        let mut img = render("8786546", &options).unwrap();
        let ms = options.module_size;
        // invert a block of data modules clear of finder, timing, format and
        // alignment patterns; far more codewords than level L can repair
        for my in 9..29u32 {
            for mx in 9..18u32 {
                let px = (mx + options.border) * ms;
                let py = (my + options.border) * ms;
                for dy in 0..ms {
                    for dx in 0..ms {
                        let p = img.get_pixel_mut(px + dx, py + dy);
                        p.0[0] = 255 - p.0[0];
                    }
                }
            }
        }
        assert!(matches!(scan(&img), Err(DecodeError::Malformed(_))));
    }
}

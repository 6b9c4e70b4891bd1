//! Turning `data:` URIs into PDF image XObjects

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{write::ZlibEncoder, Compression};
use lopdf::{dictionary, Stream};
use std::io::Write;

/// Decoded `data:<mime>;base64,<payload>` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub data: Vec<u8>,
}

pub fn parse_data_uri(uri: &str) -> Result<DataUri> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::Export("image is not a data URI".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::Export("data URI has no payload".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| Error::Export("only base64 data URIs are supported".into()))?;

    let data = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::Export(format!("invalid base64 image data: {}", e)))?;

    Ok(DataUri { mime: mime.to_string(), data })
}

/// 8-bit RGB pixels ready to embed
#[derive(Debug, Clone)]
pub struct RgbPixels {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbPixels {
    /// Decode PNG/JPEG bytes, flattening any transparency onto white
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let rgba = ::image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut data = Vec::with_capacity(rgb_len(width, height));
        for px in rgba.pixels() {
            let [r, g, b, a] = px.0;
            let alpha = a as u32;
            for c in [r, g, b] {
                data.push(((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8);
            }
        }

        Ok(Self { width, height, data })
    }

    pub fn from_data_uri(uri: &str) -> Result<Self> {
        Self::decode(&parse_data_uri(uri)?.data)
    }

    /// Flate-compressed `/Image` XObject stream
    pub fn to_xobject(&self) -> Result<Stream> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.data)?;
        let compressed = encoder.finish()?;

        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "FlateDecode",
        };
        Ok(Stream::new(dict, compressed))
    }
}

fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

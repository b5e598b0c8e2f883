//! Single-band GeoTIFF decoding and encoding with the `tiff` crate.
//!
//! Georeferencing is carried by the ModelPixelScale and ModelTiepoint tags,
//! the CRS by the GeoKey directory and the nodata value by the GDAL_NODATA
//! ASCII tag. Rotated transforms are not supported.

use agrindex_core::error::{AgrindexError, Result};
use std::io::{Cursor, Read, Seek, Write};
use tiff::decoder::{Decoder, Limits};
use tiff::encoder::compression::{Compression as TiffCompression, Lzw, Uncompressed};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tiff::TiffResult;

use crate::geotransform::GeoTransform;
use crate::tile::{RasterTile, Sample};

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Compression applied when writing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    #[default]
    Lzw,
}

/// Decode a single-band GeoTIFF from memory
pub fn decode_geotiff<T: Sample>(bytes: &[u8]) -> Result<RasterTile<T>> {
    decode_from(Cursor::new(bytes))
}

fn decode_from<T: Sample, R: Read + Seek>(reader: R) -> Result<RasterTile<T>> {
    // Full-scene bands exceed the default buffer limits
    let mut decoder = Decoder::new(reader)
        .map_err(|e| decode_error("TIFF header", e))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(|e| decode_error("dimensions", e))?;
    let rows = height as usize;
    let cols = width as usize;

    let transform = read_geotransform(&mut decoder)?;
    let epsg = read_epsg(&mut decoder)?;
    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| T::parse_nodata(s.trim_end_matches('\0')));

    let result = decoder.read_image().map_err(|e| decode_error("image data", e))?;
    let data = T::from_decoded(result).ok_or_else(|| AgrindexError::RasterDecode {
        reason: format!("unsupported sample format for {:?}", T::SAMPLE_TYPE),
    })?;

    // Multi-band images decode interleaved and fail the length check
    if data.len() != rows * cols {
        return Err(AgrindexError::RasterDecode {
            reason: format!(
                "expected {} samples for a single {}x{} band, found {}",
                rows * cols,
                rows,
                cols,
                data.len()
            ),
        });
    }

    RasterTile::from_vec(data, rows, cols, transform, epsg, nodata)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|e| decode_error("ModelPixelScale tag", e))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|e| decode_error("ModelTiepoint tag", e))?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(AgrindexError::RasterDecode {
            reason: "incomplete georeferencing tags".to_string(),
        });
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<u32> {
    let keys = decoder
        .get_tag_u32_vec(Tag::GeoKeyDirectoryTag)
        .map_err(|e| decode_error("GeoKeyDirectory tag", e))?;

    // Header is [version, revision, minor, count], then 4-value entries
    // [key, location, count, value]; location 0 means the value is inline.
    let declared = keys.get(3).copied().unwrap_or(0) as usize;
    let mut geographic = None;
    for entry in keys.get(4..).unwrap_or(&[]).chunks_exact(4).take(declared) {
        let (key, location, value) = (entry[0] as u16, entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE => return Ok(value),
            GEOGRAPHIC_TYPE => geographic = Some(value),
            _ => {}
        }
    }

    geographic.ok_or_else(|| AgrindexError::RasterDecode {
        reason: "GeoKey directory declares no EPSG code".to_string(),
    })
}

fn decode_error(what: &str, err: tiff::TiffError) -> AgrindexError {
    AgrindexError::RasterDecode { reason: format!("{}: {}", what, err) }
}

/// Encode a tile as a single-band GeoTIFF
pub fn encode_geotiff<T: Sample>(tile: &RasterTile<T>, compression: Compression) -> Result<Vec<u8>>
where
    [T]: tiff::encoder::TiffValue,
{
    let geokeys = geokey_directory(tile.epsg())?;

    let mut buf = Vec::new();
    let written = match compression {
        Compression::None => encode_into(tile, &geokeys, Cursor::new(&mut buf), Uncompressed),
        Compression::Lzw => encode_into(tile, &geokeys, Cursor::new(&mut buf), Lzw),
    };
    written.map_err(|e| AgrindexError::WriteError {
        key: "(in-memory)".to_string(),
        reason: format!("GeoTIFF encode: {}", e),
    })?;
    Ok(buf)
}

fn encode_into<T, W, D>(
    tile: &RasterTile<T>,
    geokeys: &[u16],
    writer: W,
    compression: D,
) -> TiffResult<()>
where
    T: Sample,
    [T]: tiff::encoder::TiffValue,
    W: Write + Seek,
    D: TiffCompression,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let (rows, cols) = tile.shape();

    let mut image = encoder.new_image_with_compression::<T::Color, D>(
        cols as u32,
        rows as u32,
        compression,
    )?;

    let gt = tile.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    image.encoder().write_tag(Tag::GeoKeyDirectoryTag, geokeys)?;

    if let Some(nodata) = tile.nodata() {
        let text = nodata.to_f64().to_string();
        image.encoder().write_tag(Tag::GdalNodata, text.as_str())?;
    }

    // Standard layout is contiguous for Array2 built from_shape_vec
    let samples: Vec<T> = tile.data().iter().copied().collect();
    image.write_data(&samples)
}

/// GeoKey values are SHORTs; codes past `u16::MAX` cannot be stored inline
fn geokey_directory(epsg: u32) -> Result<Vec<u16>> {
    let code = u16::try_from(epsg).map_err(|_| AgrindexError::WriteError {
        key: "(in-memory)".to_string(),
        reason: format!("EPSG:{} does not fit a GeoKey value", epsg),
    })?;
    let (model_type, crs_key) = if epsg == 4326 {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE)
    };

    Ok(vec![
        1, 1, 0, 3, // Version 1.1.0, 3 keys
        GT_MODEL_TYPE, 0, 1, model_type,
        GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, code,
    ])
}

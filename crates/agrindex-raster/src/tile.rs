//! Georeferenced single-band raster tiles

use agrindex_core::error::{AgrindexError, Result};
use ndarray::Array2;
use tiff::decoder::DecodingResult;
use tiff::encoder::colortype::{ColorType, Gray16, Gray32Float};

use crate::geotiff::Compression;
use crate::geotransform::GeoTransform;

/// Sample encoding of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    UInt16,
    Float32,
}

/// A pixel type that can live in a [`RasterTile`] and round-trip through GeoTIFF
pub trait Sample: Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// TIFF color type used when encoding
    type Color: ColorType<Inner = Self>;

    const SAMPLE_TYPE: SampleType;

    /// Take decoded samples of this type, widening where lossless
    fn from_decoded(result: DecodingResult) -> Option<Vec<Self>>;

    /// Parse a GDAL nodata string
    fn parse_nodata(s: &str) -> Option<Self>;

    fn to_f64(self) -> f64;
}

impl Sample for u16 {
    type Color = Gray16;
    const SAMPLE_TYPE: SampleType = SampleType::UInt16;

    fn from_decoded(result: DecodingResult) -> Option<Vec<Self>> {
        match result {
            DecodingResult::U16(buf) => Some(buf),
            DecodingResult::U8(buf) => Some(buf.into_iter().map(u16::from).collect()),
            _ => None,
        }
    }

    fn parse_nodata(s: &str) -> Option<Self> {
        let value: f64 = s.trim().parse().ok()?;
        (value.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&value)).then_some(value as u16)
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Sample for f32 {
    type Color = Gray32Float;
    const SAMPLE_TYPE: SampleType = SampleType::Float32;

    fn from_decoded(result: DecodingResult) -> Option<Vec<Self>> {
        match result {
            DecodingResult::F32(buf) => Some(buf),
            DecodingResult::U16(buf) => Some(buf.into_iter().map(f32::from).collect()),
            DecodingResult::U8(buf) => Some(buf.into_iter().map(f32::from).collect()),
            _ => None,
        }
    }

    fn parse_nodata(s: &str) -> Option<Self> {
        s.trim().parse().ok()
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

/// A 2-D grid of samples with its affine transform, CRS and nodata value.
///
/// Data is stored row-major, `(row, col)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile<T: Sample> {
    data: Array2<T>,
    transform: GeoTransform,
    epsg: u32,
    nodata: Option<T>,
}

/// Band samples as fetched or clipped
pub type BandTile = RasterTile<u16>;

impl<T: Sample> RasterTile<T> {
    pub fn new(data: Array2<T>, transform: GeoTransform, epsg: u32, nodata: Option<T>) -> Self {
        Self { data, transform, epsg, nodata }
    }

    /// Build a tile from row-major samples
    pub fn from_vec(
        data: Vec<T>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        epsg: u32,
        nodata: Option<T>,
    ) -> Result<Self> {
        let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| {
            AgrindexError::RasterDecode { reason: format!("{}x{} grid: {}", rows, cols, e) }
        })?;
        Ok(Self::new(array, transform, epsg, nodata))
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn is_nodata(&self, value: T) -> bool {
        self.nodata == Some(value)
    }

    /// Count of samples that are not nodata
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !self.is_nodata(**v)).count()
    }

    /// Metadata profile of this tile, as it would be written
    pub fn profile(&self, compression: Compression) -> RasterProfile {
        RasterProfile {
            width: self.cols(),
            height: self.rows(),
            transform: self.transform,
            epsg: self.epsg,
            nodata: self.nodata.map(Sample::to_f64),
            sample_type: T::SAMPLE_TYPE,
            band_count: 1,
            compression,
        }
    }
}

/// Raster-level metadata written alongside the samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterProfile {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub epsg: u32,
    pub nodata: Option<f64>,
    pub sample_type: SampleType,
    pub band_count: u16,
    pub compression: Compression,
}

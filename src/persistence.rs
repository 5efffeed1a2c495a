//! Persistence - binary field state for cross-session continuity
//!
//! Little-endian layout:
//!
//! ```text
//! header (44 bytes)
//!   magic "MFLD" | version u32 | dimension u32 | centers u32 | capacity u32
//!   kernel u32 | fractal f32 | temporal f32 | time f64 | crc32 u32
//! body
//!   axis1 u32 | axis2 u32 | slice coords (dimension − 2) × f32
//!   per center: position | re im | epsilon | g (n²) | g_inv (n²)
//! ```
//!
//! The CRC covers the first 40 header bytes followed by the body.
//!
//! Saves go to `<path>.tmp` and are renamed into place after `fsync`, so a
//! failed save never clobbers an existing file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use num_complex::Complex32;

use crate::center::Center;
use crate::config::FieldConfig;
use crate::error::{FieldError, FieldResult};
use crate::field::Field;
use crate::kernel::Kernel;
use crate::metric::Metric;
use crate::point::Point;

/// File signature.
pub const STATE_MAGIC: [u8; 4] = *b"MFLD";

/// Current format version.
pub const STATE_VERSION: u32 = 1;

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 44;

/// Files larger than this are rejected before reading.
pub const MAX_STATE_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Largest dimension accepted from a file.
pub const MAX_STATE_DIMENSION: u32 = 64;

/// Largest center capacity that can be saved or loaded.
pub const MAX_STATE_CAPACITY: usize = 1 << 24;

/// Offset of the checksum inside the header.
const CHECKSUM_OFFSET: usize = HEADER_LEN - 4;

/// Parsed state file header.
#[derive(Clone, Debug, PartialEq)]
pub struct StateHeader {
    pub version: u32,
    pub dimension: usize,
    pub num_centers: usize,
    pub capacity: usize,
    pub kernel: Kernel,
    pub fractal_dimension: f32,
    pub temporal_dimension: f32,
    pub time: f64,
    pub checksum: u32,
}

impl StateHeader {
    fn of(field: &Field, checksum: u32) -> Self {
        Self {
            version: STATE_VERSION,
            dimension: field.dimension(),
            num_centers: field.num_centers(),
            capacity: field.capacity(),
            kernel: field.kernel(),
            fractal_dimension: field.fractal_dimension(),
            temporal_dimension: field.temporal_dimension(),
            time: field.time(),
            checksum,
        }
    }

    /// Bytes per center record.
    pub fn record_len(&self) -> u64 {
        let n = self.dimension as u64;
        4 * (n + 3 + 2 * n * n)
    }

    /// Exact file length implied by this header.
    pub fn expected_file_len(&self) -> u64 {
        let projection = 8 + 4 * (self.dimension as u64).saturating_sub(2);
        HEADER_LEN as u64 + projection + self.num_centers as u64 * self.record_len()
    }

    fn encode(&self) -> FieldResult<[u8; HEADER_LEN]> {
        if self.capacity > MAX_STATE_CAPACITY {
            return Err(FieldError::InvalidArgument(format!(
                "capacity {} exceeds the saveable limit {MAX_STATE_CAPACITY}",
                self.capacity
            )));
        }
        let mut out = [0u8; HEADER_LEN];
        let mut w = Writer::new(&mut out);
        w.bytes(&STATE_MAGIC);
        w.u32(self.version);
        w.u32(to_u32(self.dimension, "dimension")?);
        w.u32(to_u32(self.num_centers, "center count")?);
        w.u32(to_u32(self.capacity, "capacity")?);
        w.u32(self.kernel.id());
        w.f32(self.fractal_dimension);
        w.f32(self.temporal_dimension);
        w.f64(self.time);
        w.u32(self.checksum);
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> FieldResult<Self> {
        let mut r = Reader::new(bytes);
        if r.take(4)? != &STATE_MAGIC[..] {
            return Err(FieldError::Format("bad magic".to_string()));
        }
        let version = r.u32()?;
        if version != STATE_VERSION {
            return Err(FieldError::Format(format!(
                "unsupported version {version} (expected {STATE_VERSION})"
            )));
        }
        let dimension = r.u32()?;
        let num_centers = r.u32()? as usize;
        let capacity = r.u32()? as usize;
        let kernel_id = r.u32()?;
        let fractal_dimension = r.f32()?;
        let temporal_dimension = r.f32()?;
        let time = r.f64()?;
        let checksum = r.u32()?;

        if !(2..=MAX_STATE_DIMENSION).contains(&dimension) {
            return Err(FieldError::Format(format!(
                "dimension {dimension} outside 2..={MAX_STATE_DIMENSION}"
            )));
        }
        if capacity > MAX_STATE_CAPACITY {
            return Err(FieldError::Format(format!(
                "capacity {capacity} exceeds {MAX_STATE_CAPACITY}"
            )));
        }
        if capacity == 0 || num_centers > capacity {
            return Err(FieldError::Format(format!(
                "{num_centers} centers do not fit capacity {capacity}"
            )));
        }
        let kernel = Kernel::from_id(kernel_id)
            .ok_or_else(|| FieldError::Format(format!("unknown kernel id {kernel_id}")))?;
        if !fractal_dimension.is_finite() || !temporal_dimension.is_finite() || !time.is_finite() {
            return Err(FieldError::Format("non-finite scalar in header".to_string()));
        }

        Ok(Self {
            version,
            dimension: dimension as usize,
            num_centers,
            capacity,
            kernel,
            fractal_dimension,
            temporal_dimension,
            time,
            checksum,
        })
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Write `field` to `path` atomically.
pub fn save_state(field: &Field, path: impl AsRef<Path>) -> FieldResult<()> {
    let path = path.as_ref();
    let body = encode_body(field);
    let mut header = StateHeader::of(field, 0).encode()?;
    let checksum = state_checksum(&header, &body);
    header[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_le_bytes());

    let tmp = temp_path(path);
    let written = write_synced(&tmp, &header, &body).and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    info!(
        "saved {} centers ({} bytes) to {}",
        field.num_centers(),
        HEADER_LEN + body.len(),
        path.display()
    );
    Ok(())
}

/// Read a field back. Nothing is returned unless the whole file checks out.
pub fn load_state(path: impl AsRef<Path>) -> FieldResult<Field> {
    let path = path.as_ref();
    check_size(fs::metadata(path)?.len())?;
    let bytes = fs::read(path)?;

    let header = StateHeader::decode(bytes.get(..HEADER_LEN).ok_or_else(truncated)?)?;
    if bytes.len() as u64 != header.expected_file_len() {
        return Err(FieldError::Format(format!(
            "file is {} bytes, header implies {}",
            bytes.len(),
            header.expected_file_len()
        )));
    }
    let body = &bytes[HEADER_LEN..];
    let actual = state_checksum(&bytes[..HEADER_LEN], body);
    if actual != header.checksum {
        return Err(FieldError::Format(format!(
            "checksum mismatch: stored {:08x}, computed {actual:08x}",
            header.checksum
        )));
    }

    let field = decode_body(&header, body)?;
    info!("loaded {} centers from {}", field.num_centers(), path.display());
    Ok(field)
}

/// Check the header and file length without reading center records.
pub fn verify_state_file(path: impl AsRef<Path>) -> FieldResult<StateHeader> {
    let path = path.as_ref();
    let len = fs::metadata(path)?.len();
    check_size(len)?;

    let mut raw = [0u8; HEADER_LEN];
    File::open(path)?
        .read_exact(&mut raw)
        .map_err(|_| truncated())?;
    let header = StateHeader::decode(&raw)?;
    if len != header.expected_file_len() {
        return Err(FieldError::Format(format!(
            "file is {len} bytes, header implies {}",
            header.expected_file_len()
        )));
    }
    debug!("verified {} ({} centers)", path.display(), header.num_centers);
    Ok(header)
}

/// CRC-32 (IEEE 802.3, reflected).
pub fn crc32(bytes: &[u8]) -> u32 {
    !crc32_update(!0, bytes)
}

fn crc32_update(mut crc: u32, bytes: &[u8]) -> u32 {
    for &b in bytes {
        crc = CRC_TABLE[((crc ^ b as u32) & 0xff) as usize] ^ (crc >> 8);
    }
    crc
}

/// CRC over the header fields (everything before the checksum) and the body.
fn state_checksum(header: &[u8], body: &[u8]) -> u32 {
    !crc32_update(crc32_update(!0, &header[..CHECKSUM_OFFSET]), body)
}

const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

// =============================================================================
// BODY CODEC
// =============================================================================

fn encode_body(field: &Field) -> Vec<u8> {
    let n = field.dimension();
    let projection = field.slice().projection();
    let mut out = Vec::with_capacity(8 + 4 * (n - 2) + field.num_centers() * 4 * (n + 3 + 2 * n * n));

    out.extend_from_slice(&(projection.axis1() as u32).to_le_bytes());
    out.extend_from_slice(&(projection.axis2() as u32).to_le_bytes());
    extend_f32(&mut out, projection.slice_coords());

    for center in field.centers() {
        extend_f32(&mut out, center.position().coords());
        let c = center.coefficient();
        extend_f32(&mut out, &[c.re, c.im, center.epsilon()]);
        extend_f32(&mut out, center.metric().components());
        extend_f32(&mut out, center.metric().inverse_components());
    }
    out
}

fn decode_body(header: &StateHeader, body: &[u8]) -> FieldResult<Field> {
    let n = header.dimension;
    let config = FieldConfig::new(n, header.capacity, header.fractal_dimension)
        .with_kernel(header.kernel);
    let mut field = Field::new(config)?;
    let mut r = Reader::new(body);

    let axis1 = r.u32()? as usize;
    let axis2 = r.u32()? as usize;
    let slice_coords = r.f32_vec(n - 2)?;
    field
        .configure_projection(axis1, axis2, slice_coords)
        .map_err(|e| FieldError::Format(format!("bad projection: {e}")))?;

    // One slice rebuild at the end instead of one per center.
    field.set_slice_auto_update(false);
    for i in 0..header.num_centers {
        let position = Point::new(r.f32_vec(n)?);
        let coefficient = Complex32::new(r.f32()?, r.f32()?);
        let epsilon = r.f32()?;
        let g = r.f32_vec(n * n)?;
        let g_inv = r.f32_vec(n * n)?;

        if !position.is_finite()
            || !coefficient.re.is_finite()
            || !coefficient.im.is_finite()
            || !epsilon.is_finite()
            || epsilon <= 0.0
            || g.iter().chain(&g_inv).any(|v| !v.is_finite())
        {
            return Err(FieldError::Format(format!("center {i} has invalid values")));
        }
        let metric = Metric::from_parts(n, g, g_inv)?;
        if !metric.validate() {
            return Err(FieldError::Format(format!(
                "center {i} metric is not symmetric positive-definite"
            )));
        }
        field.push_center(Center::with_metric(position, coefficient, epsilon, metric))?;
    }
    field.set_slice_auto_update(true);

    field.set_time(header.time);
    field.set_temporal_dimension(header.temporal_dimension);
    Ok(field)
}

// =============================================================================
// HELPERS
// =============================================================================

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_synced(path: &Path, header: &[u8], body: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(header)?;
    file.write_all(body)?;
    file.sync_all()
}

fn check_size(len: u64) -> FieldResult<()> {
    if len > MAX_STATE_FILE_SIZE {
        return Err(FieldError::Format(format!(
            "file is {len} bytes, limit is {MAX_STATE_FILE_SIZE}"
        )));
    }
    if len < HEADER_LEN as u64 {
        return Err(truncated());
    }
    Ok(())
}

fn truncated() -> FieldError {
    FieldError::Format("truncated state file".to_string())
}

fn to_u32(value: usize, what: &str) -> FieldResult<u32> {
    u32::try_from(value)
        .map_err(|_| FieldError::InvalidArgument(format!("{what} {value} does not fit the format")))
}

fn extend_f32(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

struct Writer<'a> {
    out: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(out: &'a mut [u8]) -> Self {
        Self { out, pos: 0 }
    }

    fn bytes(&mut self, b: &[u8]) {
        self.out[self.pos..self.pos + b.len()].copy_from_slice(b);
        self.pos += b.len();
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.bytes(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.bytes(&v.to_le_bytes());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> FieldResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or_else(truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> FieldResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> FieldResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> FieldResult<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> FieldResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn f32_vec(&mut self, n: usize) -> FieldResult<Vec<f32>> {
        let raw = self.take(n.checked_mul(4).ok_or_else(truncated)?)?;
        Ok(raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

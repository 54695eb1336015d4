//! Source frame model and the pixel plane repacker.
//!
//! A camera delivers frames as three independent planes (luma plus two
//! chroma), each with its own row and pixel stride; rows may carry padding
//! and chroma samples may be interleaved. The renderer wants one contiguous
//! buffer: full-resolution luma followed by half-resolution chroma pairs.
//! [`repack`] performs that conversion into a caller-provided pool slot.
//!
//! Source frames wrap a native platform resource that must be released on
//! every code path. Release is bound to `Drop`, so early returns and error
//! paths are covered by construction; the optional release hook lets
//! backends count acquisitions against releases.

use crate::error::RepackError;
use crate::quirk::DeviceQuirk;
use crate::PixelFormat;

/// One plane of a source frame. `data` may be padded: `row_stride` is the
/// byte distance between consecutive rows and `pixel_stride` between
/// consecutive samples within a row, either of which may exceed the logical
/// sample width.
pub struct Plane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }
}

/// A raw multi-plane frame as delivered by the camera subsystem. Plane
/// order is (luma, chroma-A, chroma-B). Lifetime is scoped to a single
/// delivery; the underlying native resource is released when the frame is
/// dropped.
pub struct SourceFrame {
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: u32,
    pub format: PixelFormat,
    pub planes: [Plane; 3],
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SourceFrame {
    pub fn new(
        width: u32,
        height: u32,
        rotation_degrees: u32,
        format: PixelFormat,
        planes: [Plane; 3],
    ) -> Self {
        Self {
            width,
            height,
            rotation_degrees,
            format,
            planes,
            release: None,
        }
    }

    /// Attach a release hook invoked exactly once when the frame's native
    /// resource is closed.
    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// Explicitly close the frame's native resource. Dropping the frame has
    /// the same effect; this form just names the intent.
    pub fn release(self) {}
}

impl Drop for SourceFrame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Exact repacked payload length for a frame: full-resolution luma plus two
/// half-resolution chroma planes.
pub fn required_len(width: u32, height: u32) -> usize {
    let w = width as usize;
    let h = height as usize;
    w * h + 2 * ((w / 2) * (h / 2))
}

/// A repacked frame lent to the renderer sink for one callback. `data` is a
/// borrow of the pool slot it occupies; a sink that needs the bytes past
/// the callback must copy them.
pub struct RepackedFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: u32,
    pub front_facing: bool,
    pub format: PixelFormat,
    /// Pixel stride of the source's first chroma plane, forwarded so the
    /// renderer can interpret the interleaved chroma section.
    pub chroma_pixel_stride: usize,
}

/// Convert a multi-plane source frame into the contiguous planar layout.
///
/// Writes at offset 0 of `dest` and returns the payload length, which is
/// always `required_len(width, height)` when `dest` is large enough. When
/// it is not, returns [`RepackError::BufferTooSmall`] and leaves `dest`
/// untouched. Never writes past `dest`.
///
/// Tolerances, deliberate and logged rather than fatal:
/// - a luma index past the plane bound skips the remainder of that row and
///   continues with the next row;
/// - a missing chroma sample (either plane) is substituted with 0.
///
/// Chroma pairs are emitted (plane-B, plane-A) by default, or
/// (plane-A, plane-B) when `quirk.swap_chroma_order` is set.
pub fn repack(
    frame: &SourceFrame,
    dest: &mut [u8],
    quirk: DeviceQuirk,
) -> Result<usize, RepackError> {
    if frame.format != PixelFormat::Yuv420 {
        return Err(RepackError::UnsupportedFormat(frame.format));
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let chroma_width = width / 2;
    let chroma_height = height / 2;
    let required = required_len(frame.width, frame.height);
    if dest.len() < required {
        return Err(RepackError::BufferTooSmall {
            required,
            capacity: dest.len(),
        });
    }

    let mut pos = 0;

    let luma = &frame.planes[0];
    for row in 0..height {
        let row_start = row * luma.row_stride;
        for col in 0..width {
            let index = row_start + col * luma.pixel_stride;
            let Some(&sample) = luma.data.get(index) else {
                log::warn!(
                    "luma index {} past plane bound {}, skipping rest of row {}",
                    index,
                    luma.data.len(),
                    row
                );
                break;
            };
            dest[pos] = sample;
            pos += 1;
        }
    }

    let chroma_a = &frame.planes[1];
    let chroma_b = &frame.planes[2];
    for row in 0..chroma_height {
        let a_row_start = row * chroma_a.row_stride;
        let b_row_start = row * chroma_b.row_stride;
        for col in 0..chroma_width {
            let a_index = a_row_start + col * chroma_a.pixel_stride;
            let b_index = b_row_start + col * chroma_b.pixel_stride;
            let a_sample = chroma_a.data.get(a_index).copied().unwrap_or(0);
            let b_sample = chroma_b.data.get(b_index).copied().unwrap_or(0);
            if quirk.swap_chroma_order {
                dest[pos] = a_sample;
                dest[pos + 1] = b_sample;
            } else {
                dest[pos] = b_sample;
                dest[pos + 1] = a_sample;
            }
            pos += 2;
        }
    }

    // Skipped luma samples shift everything after them toward the front;
    // pad the unreached tail so the payload length is always `required`.
    dest[pos..required].fill(0);

    Ok(required)
}

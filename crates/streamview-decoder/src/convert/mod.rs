//! Conversion of decoded planar pictures into the packed RGB24 frame handed to users.

use log::{debug, info};

use crate::{
    engine::{Picture, PixelFormat},
    error::{AllocationError, ConvertError},
    frame::{DecodedFrame, Geometry},
};

use self::yuv2rgb::raster::{self, ColorRange};

pub mod yuv2rgb;

/// Planar 4:2:0 to packed RGB24 at identical dimensions.
#[derive(Debug, Clone)]
pub struct ScalingContext {
    geometry: Geometry,
    source_format: PixelFormat,
    range: ColorRange,
}

impl ScalingContext {
    pub fn new(
        source_geometry: Geometry,
        source_format: PixelFormat,
        target_geometry: Geometry,
    ) -> Result<Self, AllocationError> {
        if source_geometry != target_geometry {
            return Err(AllocationError::Resize {
                source_geometry,
                target_geometry,
            });
        }

        let range = match source_format {
            PixelFormat::Yuv420p => ColorRange::Limited,
            PixelFormat::Yuvj420p => ColorRange::Full,
            PixelFormat::Unknown(_) => return Err(AllocationError::UnsupportedFormat(source_format)),
        };

        Ok(Self {
            geometry: source_geometry,
            source_format,
            range,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn source_format(&self) -> PixelFormat {
        self.source_format
    }

    /// Converts rows `slice_y..slice_y + slice_h` of `picture` into `destination`.
    /// Returns the number of rows written.
    pub fn scale(
        &self,
        picture: &Picture<'_>,
        slice_y: u32,
        slice_h: u32,
        destination: &mut [u8],
        destination_stride: usize,
    ) -> Result<u32, ConvertError> {
        let actual = picture.geometry();
        if actual != self.geometry {
            return Err(ConvertError::GeometryMismatch {
                expected: self.geometry,
                actual,
            });
        }

        if picture.format != self.source_format {
            return Err(ConvertError::FormatMismatch {
                expected: self.source_format,
                actual: picture.format,
            });
        }

        let height = self.geometry.height();
        let slice_end = slice_y.saturating_add(slice_h);
        if slice_end > height || slice_h == 0 {
            return Err(ConvertError::InvalidSlice {
                start: slice_y,
                end: slice_end,
                height,
            });
        }

        let width = self.geometry.width() as usize;
        let chroma_width = (width + 1) / 2;
        let last_row = slice_end as usize - 1;

        check_plane(picture, 0, width, last_row)?;
        check_plane(picture, 1, chroma_width, last_row / 2)?;
        check_plane(picture, 2, chroma_width, last_row / 2)?;

        let row_bytes = width * 3;
        if destination_stride < row_bytes {
            return Err(ConvertError::StrideTooSmall {
                plane: 3,
                stride: destination_stride,
                required: row_bytes,
            });
        }

        let required = last_row * destination_stride + row_bytes;
        if destination.len() < required {
            return Err(ConvertError::PlaneTooShort {
                plane: 3,
                len: destination.len(),
                required,
            });
        }

        let [y_plane, u_plane, v_plane] = picture.planes;
        let [y_stride, u_stride, v_stride] = picture.strides;

        for y in slice_y as usize..slice_end as usize {
            let chroma_y = y / 2;

            raster::yuv420p_row_to_rgb24(
                &y_plane[y * y_stride..y * y_stride + width],
                &u_plane[chroma_y * u_stride..chroma_y * u_stride + chroma_width],
                &v_plane[chroma_y * v_stride..chroma_y * v_stride + chroma_width],
                &mut destination[y * destination_stride..y * destination_stride + row_bytes],
                self.range,
            );
        }

        Ok(slice_h)
    }
}

fn check_plane(
    picture: &Picture<'_>,
    plane: usize,
    row_width: usize,
    last_row: usize,
) -> Result<(), ConvertError> {
    let stride = picture.strides[plane];
    if stride < row_width {
        return Err(ConvertError::StrideTooSmall {
            plane,
            stride,
            required: row_width,
        });
    }

    let len = picture.planes[plane].len();
    let required = last_row * stride + row_width;
    if len < required {
        return Err(ConvertError::PlaneTooShort {
            plane,
            len,
            required,
        });
    }

    Ok(())
}

/// RGB24 destination storage and the context feeding it, always allocated together.
#[derive(Debug)]
pub struct ConversionBuffers {
    geometry: Geometry,
    rgb: Vec<u8>,
    context: ScalingContext,
}

impl ConversionBuffers {
    pub fn allocate(
        width: u32,
        height: u32,
        source_format: PixelFormat,
        max_frame_area: u64,
    ) -> Result<Self, AllocationError> {
        if width == 0 || height == 0 {
            return Err(AllocationError::InvalidGeometry { width, height });
        }

        let geometry = Geometry::new(width, height);
        let too_large = AllocationError::TooLarge {
            width,
            height,
            limit: max_frame_area,
        };

        if geometry.area() > max_frame_area {
            return Err(too_large);
        }

        let bytes = geometry.rgb24_len().ok_or(too_large)?;

        let mut rgb = Vec::new();
        rgb.try_reserve_exact(bytes)
            .map_err(|source| AllocationError::OutOfMemory { bytes, source })?;
        rgb.resize(bytes, 0);

        let context = ScalingContext::new(geometry, source_format, geometry)?;

        Ok(Self {
            geometry,
            rgb,
            context,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }
}

#[derive(Debug)]
pub struct FormatConverter {
    buffers: Option<ConversionBuffers>,
    max_frame_area: u64,
}

impl FormatConverter {
    pub fn new(max_frame_area: u64) -> Self {
        Self {
            buffers: None,
            max_frame_area,
        }
    }

    /// Drops the current buffers, then allocates new ones for `width` x `height`. On failure
    /// the converter is left without buffers.
    pub fn reallocate_buffers(
        &mut self,
        width: u32,
        height: u32,
        source_format: PixelFormat,
    ) -> Result<Geometry, AllocationError> {
        info!("Buffer reallocation request");
        self.release();

        let buffers =
            ConversionBuffers::allocate(width, height, source_format, self.max_frame_area)?;
        let geometry = buffers.geometry();

        debug!(
            "Allocated {} bytes of RGB24 storage for {} ({})",
            buffers.rgb().len(),
            geometry,
            source_format
        );

        self.buffers = Some(buffers);

        Ok(geometry)
    }

    /// Converts the whole picture into the retained RGB24 frame. Returns `false` without
    /// touching anything when the picture has no geometry yet.
    pub fn convert_frame_to_rgb(&mut self, picture: &Picture<'_>) -> Result<bool, ConvertError> {
        if !picture.geometry().is_known() {
            return Ok(false);
        }

        let buffers = self.buffers.as_mut().ok_or(ConvertError::NoBuffers)?;
        let stride = buffers.geometry.width() as usize * 3;
        let height = buffers.geometry.height();

        buffers
            .context
            .scale(picture, 0, height, &mut buffers.rgb, stride)?;

        Ok(true)
    }

    pub fn release(&mut self) {
        if self.buffers.take().is_some() {
            info!("Buffer cleanup!");
        }
    }

    pub fn has_buffers(&self) -> bool {
        self.buffers.is_some()
    }

    /// Whether the current buffers were allocated for pictures of this geometry and format.
    pub fn matches(&self, geometry: Geometry, source_format: PixelFormat) -> bool {
        geometry.is_known()
            && self.geometry() == geometry
            && self.source_format() == Some(source_format)
    }

    pub fn source_format(&self) -> Option<PixelFormat> {
        self.buffers
            .as_ref()
            .map(|buffers| buffers.context.source_format())
    }

    pub fn geometry(&self) -> Geometry {
        self.buffers
            .as_ref()
            .map(ConversionBuffers::geometry)
            .unwrap_or(Geometry::UNKNOWN)
    }

    pub fn frame(&self) -> Option<DecodedFrame<'_>> {
        self.buffers
            .as_ref()
            .map(|buffers| DecodedFrame::new(&buffers.rgb, buffers.geometry))
    }
}

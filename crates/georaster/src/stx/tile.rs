//! Rectangular sample buffers fed to statistics operators.
use crate::error::{Error, Result};

/// Borrowed sample storage of one tile, by numeric kind.
#[derive(Clone, Copy, Debug)]
pub enum SampleData<'a> {
    U8(&'a [u8]),
    I8(&'a [i8]),
    U16(&'a [u16]),
    I16(&'a [i16]),
    U32(&'a [u32]),
    I32(&'a [i32]),
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl SampleData<'_> {
    pub fn len(&self) -> usize {
        match self {
            SampleData::U8(s) => s.len(),
            SampleData::I8(s) => s.len(),
            SampleData::U16(s) => s.len(),
            SampleData::I16(s) => s.len(),
            SampleData::U32(s) => s.len(),
            SampleData::I32(s) => s.len(),
            SampleData::F32(s) => s.len(),
            SampleData::F64(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self, SampleData::F32(_) | SampleData::F64(_))
    }
}

/// Validity mask of a tile: a sample is valid where its mask byte is non-zero.
#[derive(Clone, Copy, Debug)]
pub struct TileMask<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

/// A `width` x `height` window into a sample buffer with scanline `stride`.
#[derive(Clone, Copy, Debug)]
pub struct Tile<'a> {
    data: SampleData<'a>,
    width: usize,
    height: usize,
    stride: usize,
    mask: Option<TileMask<'a>>,
}

fn check_shape(what: &str, len: usize, width: usize, height: usize, stride: usize) -> Result<()> {
    if stride < width {
        return Err(Error::InvalidConfig(format!(
            "{what} stride {stride} is smaller than the tile width {width}"
        )));
    }
    let needed = if width == 0 || height == 0 {
        0
    } else {
        (height - 1) * stride + width
    };
    if len < needed {
        return Err(Error::InvalidConfig(format!(
            "{what} holds {len} samples, a {width}x{height} tile with stride {stride} needs {needed}"
        )));
    }
    Ok(())
}

impl<'a> Tile<'a> {
    /// Tightly packed tile (`stride == width`).
    pub fn new(data: SampleData<'a>, width: usize, height: usize) -> Result<Self> {
        Self::with_stride(data, width, height, width)
    }

    pub fn with_stride(
        data: SampleData<'a>,
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<Self> {
        check_shape("sample buffer", data.len(), width, height, stride)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
            mask: None,
        })
    }

    pub fn with_mask(mut self, mask: &'a [u8], stride: usize) -> Result<Self> {
        check_shape("mask buffer", mask.len(), self.width, self.height, stride)?;
        self.mask = Some(TileMask { data: mask, stride });
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> SampleData<'a> {
        self.data
    }

    pub fn mask(&self) -> Option<TileMask<'a>> {
        self.mask
    }

    /// Calls `f` with every sample that is unmasked and not NaN, widened to `f64`.
    pub fn for_each_valid<F: FnMut(f64)>(&self, mut f: F) {
        match self.data {
            SampleData::U8(s) => self.visit(s, &mut f),
            SampleData::I8(s) => self.visit(s, &mut f),
            SampleData::U16(s) => self.visit(s, &mut f),
            SampleData::I16(s) => self.visit(s, &mut f),
            SampleData::U32(s) => self.visit(s, &mut f),
            SampleData::I32(s) => self.visit(s, &mut f),
            SampleData::F32(s) => self.visit(s, &mut f),
            SampleData::F64(s) => self.visit(s, &mut f),
        }
    }

    fn visit<T, F>(&self, samples: &[T], f: &mut F)
    where
        T: Copy + Into<f64>,
        F: FnMut(f64),
    {
        for y in 0..self.height {
            let row = &samples[y * self.stride..y * self.stride + self.width];
            let mask = self
                .mask
                .map(|m| &m.data[y * m.stride..y * m.stride + self.width]);
            for (x, sample) in row.iter().enumerate() {
                if mask.is_some_and(|m| m[x] == 0) {
                    continue;
                }
                let value: f64 = (*sample).into();
                if !value.is_nan() {
                    f(value);
                }
            }
        }
    }
}

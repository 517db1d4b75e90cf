pub mod pixel {
    // BT.601 with 10 bits of fractional precision (multiply by 1024).
    //
    //   R = 1.164 * (Y - 16) + 1.596 * (V - 128)
    //   G = 1.164 * (Y - 16) - 0.392 * (U - 128) - 0.813 * (V - 128)
    //   B = 1.164 * (Y - 16) + 2.017 * (U - 128)
    const Y_SCALE: i32 = 1192;
    const V_TO_R: i32 = 1634;
    const U_TO_G: i32 = 401;
    const V_TO_G: i32 = 833;
    const U_TO_B: i32 = 2066;

    #[inline]
    fn clamp(value: i32) -> u8 {
        ((value + 512) >> 10).clamp(0, 255) as u8
    }

    /// Limited (video) range input.
    #[inline]
    pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
        let y = (y as i32 - 16) * Y_SCALE;
        let u = u as i32 - 128;
        let v = v as i32 - 128;

        let r = clamp(y + V_TO_R * v);
        let g = clamp(y - U_TO_G * u - V_TO_G * v);
        let b = clamp(y + U_TO_B * u);

        (r, g, b)
    }

    /// Full (JPEG) range input.
    #[inline]
    pub fn yuvj_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
        let y: f64 = y as f64;
        let u: f64 = ((u as i16) - 128) as f64;
        let v: f64 = ((v as i16) - 128) as f64;

        let r = (y + v * 1.40200).round() as u8;
        let g = (y + u * -0.34414 + v * -0.71414).round() as u8;
        let b = (y + u * 1.77200).round() as u8;

        (r, g, b)
    }
}

pub mod raster {
    use super::pixel;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ColorRange {
        Limited,
        Full,
    }

    /// Converts one row of a 4:2:0 picture. `u_row` and `v_row` are the chroma rows shared
    /// by this luma row; `rgb_row` is filled for as many pixels as it has room for.
    pub fn yuv420p_row_to_rgb24(
        y_row: &[u8],
        u_row: &[u8],
        v_row: &[u8],
        rgb_row: &mut [u8],
        range: ColorRange,
    ) {
        let convert: fn(u8, u8, u8) -> (u8, u8, u8) = match range {
            ColorRange::Limited => pixel::yuv_to_rgb,
            ColorRange::Full => pixel::yuvj_to_rgb,
        };

        for (x, rgb) in rgb_row.chunks_exact_mut(3).enumerate() {
            let (r, g, b) = convert(y_row[x], u_row[x / 2], v_row[x / 2]);

            rgb[0] = r;
            rgb[1] = g;
            rgb[2] = b;
        }
    }
}

use serde::{Deserialize, Serialize};

/// Channel order expected by the strip on the wire. The frame buffer is always RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorOrder {
    #[default]
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
}

impl ColorOrder {
    /// Source channel index (0 = R, 1 = G, 2 = B) for each wire position
    fn layout(self) -> [usize; 3] {
        match self {
            ColorOrder::Rgb => [0, 1, 2],
            ColorOrder::Rbg => [0, 2, 1],
            ColorOrder::Grb => [1, 0, 2],
            ColorOrder::Gbr => [1, 2, 0],
            ColorOrder::Brg => [2, 0, 1],
            ColorOrder::Bgr => [2, 1, 0],
        }
    }
}

/// Copy an RGB buffer into `wire`, reordering each pixel's channels
pub fn transform_pixels(rgb: &[u8], order: ColorOrder, wire: &mut Vec<u8>) {
    wire.clear();

    if order == ColorOrder::Rgb {
        wire.extend_from_slice(rgb);
        return;
    }

    let layout = order.layout();
    wire.reserve(rgb.len());
    for pixel in rgb.chunks_exact(3) {
        wire.push(pixel[layout[0]]);
        wire.push(pixel[layout[1]]);
        wire.push(pixel[layout[2]]);
    }
}

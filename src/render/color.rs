/// Maps a hue in `0.0..=255.0` onto a red → blue → green → red cycle.
///
/// Channels come back unquantized so callers can blend before truncating.
pub fn colorwheel(hue: f32) -> [f32; 3] {
    let mut pos = 255.0 - hue;

    if pos < 85.0 {
        [255.0 - pos * 3.0, 0.0, pos * 3.0]
    } else if pos < 170.0 {
        pos -= 85.0;
        [0.0, pos * 3.0, 255.0 - pos * 3.0]
    } else {
        pos -= 170.0;
        [pos * 3.0, 255.0 - pos * 3.0, 0.0]
    }
}

/// Packs 8-bit channels into a 24-bit `0xRRGGBB` value.
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

pub fn unpack_rgb(packed: u32) -> [u8; 3] {
    [
        ((packed >> 16) & 0xff) as u8,
        ((packed >> 8) & 0xff) as u8,
        (packed & 0xff) as u8,
    ]
}

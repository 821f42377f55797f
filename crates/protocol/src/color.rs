use serde::{Deserialize, Serialize};

/// Row color in hue/saturation/value space, each component nominally in
/// `[0, 1]`. Hue is allowed to run past 1.0 and wraps around the wheel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

impl Hsv {
    pub fn new(h: f64, s: f64, v: f64) -> Self {
        Self { h, s, v }
    }

    pub fn to_rgb(self) -> Rgb {
        let Hsv { h, s, v } = self;
        if s == 0.0 {
            return Rgb::new(v, v, v);
        }
        let scaled = h * 6.0;
        let sector = scaled.floor();
        let f = scaled - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        match (sector as i64).rem_euclid(6) {
            0 => Rgb::new(v, t, p),
            1 => Rgb::new(q, v, p),
            2 => Rgb::new(p, v, t),
            3 => Rgb::new(p, q, v),
            4 => Rgb::new(t, p, v),
            _ => Rgb::new(v, p, q),
        }
    }

    /// CSS `background` value, e.g. `rgb(100.000000%,75.000000%,50.000000%)`.
    pub fn css_background(self) -> String {
        let Rgb { r, g, b } = self.to_rgb();
        format!(
            "rgb({:.6}%,{:.6}%,{:.6}%)",
            r * 100.0,
            g * 100.0,
            b * 100.0
        )
    }
}

impl Default for Hsv {
    /// Color of a root row: red hue at half saturation.
    fn default() -> Self {
        Self::new(0.0, 0.5, 1.0)
    }
}

/// Linear RGB with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// 8-bit channels for terminal backends.
    pub fn to_u8(self) -> (u8, u8, u8) {
        let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        (channel(self.r), channel(self.g), channel(self.b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Rgb, b: Rgb) -> bool {
        (a.r - b.r).abs() < 1e-9 && (a.g - b.g).abs() < 1e-9 && (a.b - b.b).abs() < 1e-9
    }

    #[test]
    fn zero_saturation_is_gray() {
        assert_eq!(Hsv::new(0.7, 0.0, 0.4).to_rgb(), Rgb::new(0.4, 0.4, 0.4));
    }

    #[test]
    fn primary_hues() {
        assert!(close(Hsv::new(0.0, 1.0, 1.0).to_rgb(), Rgb::new(1.0, 0.0, 0.0)));
        assert!(close(Hsv::new(1.0 / 3.0, 1.0, 1.0).to_rgb(), Rgb::new(0.0, 1.0, 0.0)));
        assert!(close(Hsv::new(2.0 / 3.0, 1.0, 1.0).to_rgb(), Rgb::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn hue_wraps_past_one() {
        let wrapped = Hsv::new(1.25, 0.8, 1.0).to_rgb();
        let base = Hsv::new(0.25, 0.8, 1.0).to_rgb();
        assert!(close(wrapped, base));
    }

    #[test]
    fn root_background() {
        assert_eq!(
            Hsv::default().css_background(),
            "rgb(100.000000%,50.000000%,50.000000%)"
        );
    }

    #[test]
    fn u8_channels() {
        assert_eq!(Rgb::new(1.0, 0.5, 0.0).to_u8(), (255, 128, 0));
    }
}

/// Yellow-orange-red, four stops.
pub const YL_OR_RD_4: [(u8, u8, u8); 4] = [
    (0xff, 0xff, 0xb2),
    (0xfe, 0xcc, 0x5c),
    (0xfd, 0x8d, 0x3c),
    (0xe3, 0x1a, 0x1c),
];

/// Linear interpolation between evenly spaced colour stops over `[vmin, vmax]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearColormap {
    stops: Vec<(u8, u8, u8)>,
    pub vmin: f64,
    pub vmax: f64,
}

impl LinearColormap {
    pub fn new(stops: &[(u8, u8, u8)], vmin: f64, vmax: f64) -> Self {
        Self {
            stops: stops.to_vec(),
            vmin,
            vmax,
        }
    }

    pub fn yl_or_rd(vmin: f64, vmax: f64) -> Self {
        Self::new(&YL_OR_RD_4, vmin, vmax)
    }

    pub fn stops(&self) -> &[(u8, u8, u8)] {
        &self.stops
    }

    /// Values outside the range are clamped; a collapsed range maps to the
    /// first stop.
    pub fn rgb(&self, value: f64) -> (u8, u8, u8) {
        let Some(&first) = self.stops.first() else {
            return (0, 0, 0);
        };
        let span = self.vmax - self.vmin;
        if self.stops.len() == 1 || !(span > 0.0) || !value.is_finite() {
            return first;
        }

        let t = ((value - self.vmin) / span).clamp(0.0, 1.0);
        let scaled = t * (self.stops.len() - 1) as f64;
        let lower = (scaled.floor() as usize).min(self.stops.len() - 2);
        let frac = scaled - lower as f64;

        let (a, b) = (self.stops[lower], self.stops[lower + 1]);
        let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
        (lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
    }

    pub fn stop_hexes(&self) -> Vec<String> {
        self.stops
            .iter()
            .map(|(r, g, b)| format!("#{r:02x}{g:02x}{b:02x}"))
            .collect()
    }
}

//! Meteorological derivations.
//!
//! Every function here is pure. Units are fixed: °C, hPa, %, km/h and meters.
//! Rounding uses [`f64::round`], i.e. half away from zero.

use serde::{Deserialize, Serialize};

use crate::config::FieldSelection;

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Upper bounds (exclusive, in knots) of Beaufort force 0..=11.
const BEAUFORT_KNOTS: [f64; 12] = [
    1.0, 4.0, 7.0, 11.0, 16.0, 22.0, 28.0, 34.0, 41.0, 48.0, 56.0, 64.0,
];

const BEAUFORT_LABELS: [&str; 13] = [
    "Calm",
    "Light air",
    "Light breeze",
    "Gentle breeze",
    "Moderate breeze",
    "Fresh breeze",
    "Strong breeze",
    "High wind",
    "Gale",
    "Strong gale",
    "Storm",
    "Hurricane force",
    "Violent storm",
];

const KMH_PER_KNOT: f64 = 1.852;
const KMH_PER_MS: f64 = 3.6;

/// Raw observation as delivered by one API response.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    /// km/h
    pub wind_speed: f64,
    pub wind_deg: i32,
    /// Station altitude in meters, used for the absolute pressure.
    pub altitude: f64,
}

/// Values computed from an [`Observation`]. A field is `None` when it was not selected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dewpoint: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windchill: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatindex: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beaufort_force: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beaufort_text: Option<String>,
    /// Compass label followed by the angle, e.g. `SSW (200°)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compass_text: Option<String>,
}

impl Observation {
    pub fn derive(&self, selection: &FieldSelection) -> DerivedReading {
        let mut derived = DerivedReading::wind(self.wind_speed, self.wind_deg, selection);

        if selection.dewpoint {
            derived.dewpoint = Some(dewpoint(self.temperature, self.humidity));
        }
        if selection.absolute_humidity {
            derived.absolute_humidity = Some(absolute_humidity(self.temperature, self.humidity));
        }
        if selection.absolute_pressure {
            derived.absolute_pressure =
                Some(absolute_pressure(self.pressure, self.temperature, self.altitude));
        }
        if selection.windchill {
            derived.windchill = Some(windchill(self.temperature, self.wind_speed));
        }
        if selection.heatindex {
            derived.heatindex = Some(heat_index(self.temperature, self.humidity));
        }

        derived
    }
}

impl DerivedReading {
    /// Only the wind related fields; forecast slots carry nothing else.
    pub fn wind(speed_kmh: f64, deg: i32, selection: &FieldSelection) -> Self {
        let mut derived = Self::default();

        if selection.windstrength || selection.windstrength_text {
            let bft = wind_speed_to_beaufort(speed_kmh);
            if selection.windstrength {
                derived.beaufort_force = Some(bft);
            }
            if selection.windstrength_text {
                derived.beaufort_text = Some(beaufort_to_text(bft).to_string());
            }
        }
        if selection.winddirection {
            derived.compass_text = Some(wind_direction_label(deg));
        }

        derived
    }
}

/// Round to `digits` decimal places, half away from zero.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Dewpoint (Magnus formula), whole degrees.
pub fn dewpoint(temp: f64, humidity: f64) -> f64 {
    let (k2, k3) = if temp > 0.0 {
        (17.62, 243.12)
    } else {
        (22.46, 272.62)
    };
    let rh = (humidity / 100.0).ln();
    let dp = k3 * ((k2 * temp) / (k3 + temp) + rh) / ((k2 * k3) / (k3 + temp) - rh);
    dp.round()
}

/// Absolute humidity in g/m³, one decimal.
pub fn absolute_humidity(temp: f64, humidity: f64) -> f64 {
    let (a, b) = if temp >= 0.0 { (7.5, 237.3) } else { (7.6, 240.7) };

    // universal gas constant J/(kmol*K) and molar mass of water vapour kg/kmol
    const R: f64 = 8314.3;
    const MW: f64 = 18.016;

    let saturation = 6.1078 * 10f64.powf((a * temp) / (b + temp));
    let vapour = humidity / 100.0 * saturation;
    let kelvin = temp + 273.15;

    round_to(1e5 * MW / R * vapour / kelvin, 1)
}

/// Barometric reading reduced with the station altitude. Not rounded.
pub fn absolute_pressure(pressure: f64, temp: f64, altitude: f64) -> f64 {
    const TG: f64 = 0.0065;

    let ad = -altitude;
    let kelvin = temp + TG * ad + 273.15;

    pressure / (1.0 - TG * ad / kelvin).powf(0.03416 / TG)
}

/// 16-point compass label. Negative angles have no label.
pub fn wind_direction_to_text(deg: i32) -> &'static str {
    // `%` keeps the sign of the dividend, so negative input falls out of range
    let idx = (((f64::from(deg) + 11.25) % 360.0) / 22.5).floor();
    if (0.0..COMPASS_POINTS.len() as f64).contains(&idx) {
        COMPASS_POINTS[idx as usize]
    } else {
        ""
    }
}

pub fn wind_direction_label(deg: i32) -> String {
    format!("{} ({deg}°)", wind_direction_to_text(deg))
}

/// Beaufort force for a speed in km/h. Above the last bound the table length is returned.
pub fn wind_speed_to_beaufort(speed_kmh: f64) -> u8 {
    let knots = speed_kmh / KMH_PER_KNOT;
    BEAUFORT_KNOTS
        .iter()
        .position(|&limit| knots < limit)
        .unwrap_or(BEAUFORT_KNOTS.len()) as u8
}

pub fn beaufort_to_text(bft: u8) -> &'static str {
    BEAUFORT_LABELS.get(usize::from(bft)).copied().unwrap_or("")
}

/// Windchill, one decimal. Below 5 km/h the air temperature is returned as is.
pub fn windchill(temp: f64, speed_kmh: f64) -> f64 {
    if speed_kmh < 5.0 {
        return temp;
    }
    let v = speed_kmh.powf(0.16);
    round_to(13.12 + 0.6215 * temp - 11.37 * v + 0.3965 * temp * v, 1)
}

/// Heat index (Rothfusz regression), whole degrees. Only defined from 27 °C and 40 %.
pub fn heat_index(temp: f64, hum: f64) -> f64 {
    if temp < 27.0 || hum < 40.0 {
        return temp;
    }

    const C1: f64 = -8.784695;
    const C2: f64 = 1.61139411;
    const C3: f64 = 2.338549;
    const C4: f64 = -0.14611605;
    const C5: f64 = -1.2308094e-2;
    const C6: f64 = -1.6424828e-2;
    const C7: f64 = 2.211732e-3;
    const C8: f64 = 7.2546e-4;
    const C9: f64 = -3.582e-6;

    let t2 = temp * temp;
    let h2 = hum * hum;
    let hi = C1
        + C2 * temp
        + C3 * hum
        + C4 * temp * hum
        + C5 * t2
        + C6 * h2
        + C7 * t2 * hum
        + C8 * temp * h2
        + C9 * t2 * h2;
    hi.round()
}

/// m/s to km/h. Anything that is not a number (or a numeric string) yields `None`.
pub fn ms_to_kmh(speed: &serde_json::Value) -> Option<f64> {
    let ms = match speed {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    Some(ms * KMH_PER_MS)
}

//! Optical power / attenuation parser and signal classification.
//!
//! ```text
//! OLT                  ONU              Attenuation
//! --------------------------------------------------------------------
//!  up      Rx :-23.010(dbm)      Tx:2.316(dbm)        25.326(dB)
//!  down    Tx :6.530(dbm)        Rx:-20.112(dbm)      26.642(dB)
//! ```
//!
//! On the `down` line the Rx column is the power received by the ONU,
//! which is what signal classification looks at.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::clean_lines;

static DIRECTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\s*(up|down)\b").unwrap());

static RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bRx\s*:\s*(-?\d+(?:\.\d+)?)").unwrap());

static TX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTx\s*:\s*(-?\d+(?:\.\d+)?)").unwrap());

static ATTENUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*\(dB\)").unwrap());

/// Link direction of one attenuation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// One direction's readings. Fields that cannot be extracted are `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttenuationRow {
    pub direction: Direction,
    pub rx_dbm: f64,
    pub tx_dbm: f64,
    pub attenuation_db: f64,
}

impl AttenuationRow {
    fn unknown(direction: Direction) -> Self {
        Self {
            direction,
            rx_dbm: f64::NAN,
            tx_dbm: f64::NAN,
            attenuation_db: f64::NAN,
        }
    }
}

fn capture_f64(re: &Regex, line: &str) -> f64 {
    re.captures(line)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(f64::NAN)
}

/// Parse the up/down rows. Each field is extracted independently, so a
/// partially malformed line still yields the fields it does carry.
pub fn parse_attenuation(raw: &str) -> Vec<AttenuationRow> {
    clean_lines(raw)
        .into_iter()
        .filter_map(|line| {
            let caps = DIRECTION.captures(line)?;
            let direction = if caps[1].eq_ignore_ascii_case("up") {
                Direction::Up
            } else {
                Direction::Down
            };
            Some(AttenuationRow {
                direction,
                rx_dbm: capture_f64(&RX, line),
                tx_dbm: capture_f64(&TX, line),
                attenuation_db: capture_f64(&ATTENUATION, line),
            })
        })
        .collect()
}

/// Received-power quality band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalBand {
    Good,
    Warning,
    Critical,
    Unknown,
}

impl SignalBand {
    /// `Good` at or above -25 dBm, `Warning` down to -27 dBm, `Critical`
    /// below that, `Unknown` for `NaN`.
    pub fn from_rx(rx_dbm: f64) -> Self {
        if rx_dbm.is_nan() {
            SignalBand::Unknown
        } else if rx_dbm >= -25.0 {
            SignalBand::Good
        } else if rx_dbm >= -27.0 {
            SignalBand::Warning
        } else {
            SignalBand::Critical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalBand::Good => "good",
            SignalBand::Warning => "warning",
            SignalBand::Critical => "critical",
            SignalBand::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SignalBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both directions for one ONU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttenuationReading {
    pub up: AttenuationRow,
    pub down: AttenuationRow,
}

impl AttenuationReading {
    /// Reading with every field `NaN`.
    pub fn unknown() -> Self {
        Self {
            up: AttenuationRow::unknown(Direction::Up),
            down: AttenuationRow::unknown(Direction::Down),
        }
    }

    /// Pick the first row of each direction; missing directions are `NaN`.
    pub fn from_rows(rows: &[AttenuationRow]) -> Self {
        let pick = |d: Direction| {
            rows.iter()
                .find(|r| r.direction == d)
                .copied()
                .unwrap_or_else(|| AttenuationRow::unknown(d))
        };
        Self {
            up: pick(Direction::Up),
            down: pick(Direction::Down),
        }
    }

    pub fn parse(raw: &str) -> Self {
        Self::from_rows(&parse_attenuation(raw))
    }

    /// Power received by the ONU, falling back to the OLT's receive power
    /// when the downstream row is unreadable.
    pub fn onu_rx_dbm(&self) -> f64 {
        if self.down.rx_dbm.is_nan() {
            self.up.rx_dbm
        } else {
            self.down.rx_dbm
        }
    }

    pub fn band(&self) -> SignalBand {
        SignalBand::from_rx(self.onu_rx_dbm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
           OLT                  ONU              Attenuation
--------------------------------------------------------------------------
 up      Rx :-23.010(dbm)      Tx:2.316(dbm)        25.326(dB)
 down    Tx :6.530(dbm)        Rx:-20.112(dbm)      26.642(dB)
";

    #[test]
    fn test_parse_rows() {
        let rows = parse_attenuation(OUTPUT);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].direction, Direction::Up);
        assert_eq!(rows[0].rx_dbm, -23.010);
        assert_eq!(rows[0].tx_dbm, 2.316);
        assert_eq!(rows[0].attenuation_db, 25.326);
        assert_eq!(rows[1].direction, Direction::Down);
        assert_eq!(rows[1].rx_dbm, -20.112);
        assert_eq!(rows[1].tx_dbm, 6.530);
    }

    #[test]
    fn test_idempotent() {
        assert_eq!(parse_attenuation(OUTPUT), parse_attenuation(OUTPUT));
    }

    #[test]
    fn test_missing_field_degrades_to_nan() {
        let raw = " up      Rx :N/A(dbm)      Tx:2.316(dbm)        25.326(dB)\n";
        let rows = parse_attenuation(raw);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].rx_dbm.is_nan());
        assert_eq!(rows[0].tx_dbm, 2.316);
        assert_eq!(rows[0].attenuation_db, 25.326);
    }

    #[test]
    fn test_reading_and_band() {
        let reading = AttenuationReading::parse(OUTPUT);
        assert_eq!(reading.onu_rx_dbm(), -20.112);
        assert_eq!(reading.band(), SignalBand::Good);

        let reading = AttenuationReading::parse("%Error 20203: Unknown command.");
        assert!(reading.up.rx_dbm.is_nan());
        assert!(reading.down.attenuation_db.is_nan());
        assert_eq!(reading.band(), SignalBand::Unknown);
    }

    #[test]
    fn test_signal_bands() {
        assert_eq!(SignalBand::from_rx(-18.0), SignalBand::Good);
        assert_eq!(SignalBand::from_rx(-25.0), SignalBand::Good);
        assert_eq!(SignalBand::from_rx(-26.5), SignalBand::Warning);
        assert_eq!(SignalBand::from_rx(-27.0), SignalBand::Warning);
        assert_eq!(SignalBand::from_rx(-28.1), SignalBand::Critical);
        assert_eq!(SignalBand::from_rx(f64::NAN), SignalBand::Unknown);
    }
}

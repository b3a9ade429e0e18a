//! Measurement identifier grammar: file name <-> `MeasurementDescriptor`.
//!
//! Tokens are `_`-separated and their meaning is fixed by position once the
//! probe mode and activity are known:
//!
//! ```text
//! two-probe    (w,g,s,c)_YYMMDDHHMM[SS]_<activity>_<params>_<icc><uA|mA>
//!              set | form | reset   params = <start V>_<end V>_<ramp V/s>
//!              observe              params = <platinum V>_<copper V>
//! three-probe  (w,g,s,c)_(w,g,s,c)[_<trailer>]
//! ```
//!
//! Unknown two-probe activities decode to `Activity::Invalid` instead of
//! failing, so a batch can report them per file.

use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{Error, Result};
use crate::types::*;

/// Bare decimal number, optionally signed and in scientific notation.
const NUMBER: &str = r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?";

static HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\((?P<target>[^()_]*)\)(?:_(?P<rest>.*))?$").expect("head grammar"));

static NEIGHBOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\((?P<neighbor>[^()_]*)\)(?:_(?P<trailer>.*))?$").expect("neighbor grammar")
});

static TWO_PROBE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<stamp>[^_]+)_(?P<activity>[^_]+)(?:_(?P<params>.*))?$")
        .expect("two-probe grammar")
});

static STAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<yy>\d{2})(?P<mo>\d{2})(?P<dd>\d{2})(?P<hh>\d{2})(?P<mi>\d{2})(?P<ss>\d{2})?$")
        .expect("timestamp grammar")
});

static SWEEP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<start>{n})_(?P<end>{n})_(?P<ramp>{n})_(?P<icc>{n})(?P<unit>uA|mA)$",
        n = NUMBER
    ))
    .expect("sweep grammar")
});

static OBSERVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<platinum>{n})_(?P<copper>{n})_(?P<icc>{n})(?P<unit>uA|mA)$",
        n = NUMBER
    ))
    .expect("observe grammar")
});

/// Decode a file-name stem (no extension) into a descriptor.
pub fn decode(identifier: &str) -> Result<MeasurementDescriptor> {
    let head = HEAD.captures(identifier).ok_or_else(|| {
        Error::malformed_identifier(identifier, "expected a leading `(wafer,grid,subgrid,cell)` token")
    })?;
    let target = parse_cell(identifier, &head["target"])?;
    let rest = head.name("rest").map_or("", |m| m.as_str());

    if let Some(caps) = NEIGHBOR.captures(rest) {
        let neighbor = parse_cell(identifier, &caps["neighbor"])?;
        let trailer = caps.name("trailer").map(|m| m.as_str().to_string());
        // Run logs sometimes place the timestamp right after the neighbor cell.
        let timestamp = trailer
            .as_deref()
            .and_then(|t| t.split('_').next())
            .and_then(|token| parse_timestamp(identifier, token).ok());

        return Ok(MeasurementDescriptor {
            target,
            neighbor: Some(neighbor),
            probe_mode: ProbeMode::ThreeProbe,
            timestamp,
            activity: Activity::ThreeProbe,
            parameters: ActivityParameters::NotApplicable,
            trailer,
        });
    }

    let caps = TWO_PROBE.captures(rest).ok_or_else(|| {
        Error::malformed_identifier(identifier, "expected `_<timestamp>_<activity>` after the target cell")
    })?;
    let timestamp = parse_timestamp(identifier, &caps["stamp"])?;
    let activity = Activity::from_token(&caps["activity"]);
    let params = caps.name("params").map_or("", |m| m.as_str());

    let parameters = match activity {
        Activity::Set | Activity::Form | Activity::Reset => {
            let p = SWEEP.captures(params).ok_or_else(|| {
                Error::malformed_identifier(
                    identifier,
                    format!("{} expects `<start>_<end>_<ramp>_<icc><uA|mA>`", activity),
                )
            })?;
            ActivityParameters::Sweep {
                start_voltage: number(identifier, &p, "start")?,
                end_voltage: number(identifier, &p, "end")?,
                ramp_rate: number(identifier, &p, "ramp")?,
                compliance: compliance(identifier, &p)?,
            }
        }
        Activity::Observe => {
            let p = OBSERVE.captures(params).ok_or_else(|| {
                Error::malformed_identifier(
                    identifier,
                    "observe expects `<platinum>_<copper>_<icc><uA|mA>`",
                )
            })?;
            ActivityParameters::Observe {
                platinum_voltage: number(identifier, &p, "platinum")?,
                copper_voltage: number(identifier, &p, "copper")?,
                compliance: compliance(identifier, &p)?,
            }
        }
        Activity::ThreeProbe | Activity::Invalid(_) => ActivityParameters::NotApplicable,
    };

    Ok(MeasurementDescriptor {
        target,
        neighbor: None,
        probe_mode: ProbeMode::TwoProbe,
        timestamp: Some(timestamp),
        activity,
        parameters,
        trailer: None,
    })
}

/// Decode the file-name component of `path`.
///
/// Spaces are removed and a `.csv` / `.csv.gz` extension is stripped first.
pub fn decode_path<P: AsRef<Path>>(path: P) -> Result<MeasurementDescriptor> {
    let path = path.as_ref();
    let stem = identifier_stem(path).ok_or_else(|| {
        Error::malformed_identifier(&path.display().to_string(), "path has no file name")
    })?;
    decode(&stem)
}

/// The decodable part of a file name.
pub fn identifier_stem<P: AsRef<Path>>(path: P) -> Option<String> {
    let name = path.as_ref().file_name()?.to_string_lossy().replace(' ', "");
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let name = name.strip_suffix(".csv").unwrap_or(name);
    Some(name.to_string())
}

/// Render the canonical identifier of a descriptor (without extension).
pub fn encode(descriptor: &MeasurementDescriptor) -> String {
    let mut out = descriptor.target.to_string();

    if let Some(neighbor) = &descriptor.neighbor {
        out.push('_');
        out.push_str(&neighbor.to_string());
        if let Some(trailer) = &descriptor.trailer {
            out.push('_');
            out.push_str(trailer);
        }
        return out;
    }

    if let Some(timestamp) = &descriptor.timestamp {
        out.push('_');
        out.push_str(timestamp.token());
    }
    out.push('_');
    out.push_str(descriptor.activity.name());

    match &descriptor.parameters {
        ActivityParameters::Sweep {
            start_voltage,
            end_voltage,
            ramp_rate,
            compliance,
        } => {
            out.push_str(&format!(
                "_{}_{}_{}_{}",
                start_voltage, end_voltage, ramp_rate, compliance
            ));
        }
        ActivityParameters::Observe {
            platinum_voltage,
            copper_voltage,
            compliance,
        } => {
            out.push_str(&format!("_{}_{}_{}", platinum_voltage, copper_voltage, compliance));
        }
        ActivityParameters::NotApplicable => {}
    }
    out
}

impl MeasurementDescriptor {
    /// Canonical identifier, see [`encode`].
    pub fn identifier(&self) -> String {
        encode(self)
    }

    /// Canonical CSV file name.
    pub fn file_name(&self) -> String {
        format!("{}.csv", encode(self))
    }
}

impl FromStr for CellPosition {
    type Err = Error;

    /// Parse the parenthesized `(wafer,grid,subgrid,cell)` form.
    fn from_str(s: &str) -> Result<Self> {
        let inner = s
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .ok_or_else(|| Error::malformed_identifier(s, "cell position must be parenthesized"))?;
        parse_cell(s, inner)
    }
}

// ── Field parsers ───────────────────────────────────────────────────

/// Split `w,g,s,c`. Subgrids may themselves contain commas (`-1,-1`), so
/// everything between grid and cell is the subgrid.
fn parse_cell(identifier: &str, inner: &str) -> Result<CellPosition> {
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() < 4 {
        return Err(Error::malformed_identifier(
            identifier,
            format!("cell position `({})` needs wafer, grid, subgrid and cell", inner),
        ));
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::malformed_identifier(
            identifier,
            format!("cell position `({})` has an empty component", inner),
        ));
    }
    let last = parts.len() - 1;
    Ok(CellPosition::new(
        parts[0],
        parts[1],
        parts[2..last].join(","),
        parts[last],
    ))
}

fn parse_timestamp(identifier: &str, token: &str) -> Result<Timestamp> {
    let caps = STAMP.captures(token).ok_or_else(|| {
        Error::malformed_identifier(
            identifier,
            format!("timestamp `{}` is not YYMMDDHHMM or YYMMDDHHMMSS", token),
        )
    })?;

    let field = |name: &str| -> u32 { caps.name(name).map_or(0, |m| m.as_str().parse().unwrap_or(0)) };
    let has_seconds = caps.name("ss").is_some();

    let datetime = NaiveDate::from_ymd_opt(2000 + field("yy") as i32, field("mo"), field("dd"))
        .and_then(|date| date.and_hms_opt(field("hh"), field("mi"), field("ss")))
        .ok_or_else(|| {
            Error::malformed_identifier(identifier, format!("timestamp `{}` is not a valid date", token))
        })?;

    Ok(Timestamp {
        token: token.to_string(),
        datetime,
        has_seconds,
    })
}

fn number(identifier: &str, caps: &Captures<'_>, name: &str) -> Result<f64> {
    let text = caps.name(name).map_or("", |m| m.as_str());
    text.parse::<f64>().map_err(|_| {
        Error::malformed_identifier(identifier, format!("{} `{}` is not a number", name, text))
    })
}

fn compliance(identifier: &str, caps: &Captures<'_>) -> Result<ComplianceCurrent> {
    let magnitude = number(identifier, caps, "icc")?;
    let suffix = caps.name("unit").map_or("", |m| m.as_str());
    let unit = CurrentUnit::from_suffix(suffix).ok_or_else(|| {
        Error::malformed_identifier(identifier, format!("unknown compliance unit `{}`", suffix))
    })?;
    Ok(ComplianceCurrent::new(magnitude, unit))
}

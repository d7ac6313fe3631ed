//! Line protocol of the headless shell.
//!
//! Plain lines are messages from the content surface, JSON or bare tokens,
//! exactly as the surface would post them. Lines starting with `#` inject
//! host events:
//!
//! ```text
//! #lifecycle active|inactive|background
//! #connectivity on|off
//! #location on|off
//! #loaded
//! #back
//! #capture | #confirm | #cancel
//! ```

use anyhow::{anyhow, bail, Result};

use tether_core::{AppLifecycleState, CameraEvent, Fix, HostInput, NativeEvent, RawMessage};

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<HostInput>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(command) = line.strip_prefix('#') else {
        return Ok(Some(HostInput::Surface(RawMessage::Text(line.to_owned()))));
    };

    let mut words = command.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let arg = words.next();
    let event = match verb {
        "lifecycle" => {
            let state = arg.and_then(AppLifecycleState::parse).ok_or_else(|| {
                anyhow!("expected active, inactive or background")
            })?;
            NativeEvent::Lifecycle(state)
        }
        "connectivity" => NativeEvent::Connectivity {
            mobile_data_on: on_off(arg)?,
        },
        "location" => NativeEvent::LocationStatus {
            location_on: on_off(arg)?,
        },
        "loaded" => NativeEvent::SurfaceLoaded,
        "back" => NativeEvent::BackPressed,
        "capture" => NativeEvent::Camera(CameraEvent::CaptureRequested),
        "confirm" => NativeEvent::Camera(CameraEvent::Confirmed),
        "cancel" => NativeEvent::Camera(CameraEvent::Cancelled),
        other => bail!("unknown host event `{other}`"),
    };
    Ok(Some(HostInput::Native(event)))
}

fn on_off(arg: Option<&str>) -> Result<bool> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => bail!("expected on or off"),
    }
}

/// Parse a simulated route: `lat,lng[,accuracy]` points separated by `;`.
pub fn parse_route(points: &str) -> Result<Vec<Fix>> {
    points.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|point| {
            let parts: Vec<&str> = point.split(',').map(str::trim).collect();
            let num = |s: &str| {
                s.parse::<f64>()
                    .map_err(|_| anyhow!("bad number `{s}` in route point `{point}`"))
            };
            match parts.as_slice() {
                [lat, lng] => Ok(Fix::new(num(lat)?, num(lng)?, None)),
                [lat, lng, acc] => Ok(Fix::new(num(lat)?, num(lng)?, Some(num(acc)?))),
                _ => bail!("route point `{point}` needs lat,lng[,accuracy]"),
            }
        })
        .collect()
}

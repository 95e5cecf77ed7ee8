//! HTML views of latest readings and station names

use chrono::{Duration, Local, SecondsFormat};
use htc_core::LatestReading;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Readings older than this are flagged as late
pub const STALE_AFTER_HOURS: i64 = 24;

/// Seconds between automatic reloads of the latest readings page
const REFRESH_SECONDS: u32 = 300;

const STYLE: &str = "
.body {width:100%; }
.measurements {width: 90%;}
.measurement {float:left; width:200px;}
.station {float:left; font-size:16pt;}
.time {float:left; font-size:12pt;}
.temp {float:left; clear:both; font-size:40pt;}
.hum {float:left; font-size:12pt;}
.late { background-color:red; }
";

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// One tile of the latest readings page
pub fn measurement_div(reading: &LatestReading) -> String {
    let late = if reading.is_stale(Duration::hours(STALE_AFTER_HOURS)) {
        " late"
    } else {
        ""
    };
    format!(
        concat!(
            r#"<div class="measurement{late}" id="{id}">"#,
            r#"<div class="station">{name}</div>"#,
            r#"<div class="time" data-time="{iso}">{hhmm}</div>"#,
            r#"<div class="temp">{temp:.1}<span class="degrees">°C</span></div>"#,
            r#"<div class="hum">{hum:.0}<span class="percent">%</span></div>"#,
            "</div>"
        ),
        late = late,
        id = escape(&reading.station_id),
        name = escape(&reading.name),
        iso = reading.time.to_rfc3339_opts(SecondsFormat::Millis, true),
        hhmm = reading.time.with_timezone(&Local).format("%H:%M"),
        temp = reading.temperature,
        hum = reading.humidity,
    )
}

pub fn latest_page(readings: &[LatestReading]) -> String {
    let mut tiles = String::new();
    for reading in readings {
        tiles.push_str(&measurement_div(reading));
        tiles.push('\n');
    }
    format!(
        r#"<html>
<head><meta charset="UTF-8"><meta http-equiv="refresh" content="{REFRESH_SECONDS}"><title>Temperatures</title>
<style>{STYLE}</style>
</head>
<body>
<div class="measurements">
{tiles}</div>
</body>
</html>
"#
    )
}

pub fn names_table(names: &BTreeMap<String, String>) -> String {
    let mut out = String::from("<table>");
    for (station_id, name) in names {
        // writing to a String cannot fail
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape(station_id),
            escape(name)
        );
    }
    out.push_str("</table>");
    out
}

pub fn names_page(names: &BTreeMap<String, String>) -> String {
    format!(
        "<html><head><meta charset=\"UTF-8\"><title>Stations</title></head><body>\n{}\n</body></html>\n",
        names_table(names)
    )
}

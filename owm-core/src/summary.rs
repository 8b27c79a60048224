//! HTML snippets for dashboards.

use std::fmt::{Display, Write};

use chrono::{DateTime, Local, TimeZone};

use crate::model::{CurrentReading, DailySlot, ForecastSlot};

pub const ICON_BASE_URL: &str = "http://openweathermap.org/img/w/";

const CELL_STYLE: &str = "width: 140px; padding: 0px; padding-left: 20px;";

/// Current weather followed by one column per 3-hour slot.
///
/// Slot headers read `today` or the weekday, plus `HH:MM`, both in the time zone of `now`.
/// Icon and cloudiness are taken from the readings, so map them with every field selected.
pub fn weather_summary_html<Tz>(
    current: &CurrentReading,
    forecast: &[ForecastSlot],
    now: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut html = String::from("\n<table>\n  <tr>\n");

    push_column(
        &mut html,
        "current",
        current.conditions.icon.as_deref(),
        [current.observation.temperature.round(), current.observation.humidity.round()],
        ["°C", "%"],
        Details {
            wind_speed: current.observation.wind_speed,
            rain_3h: current.rain_3h,
            cloudiness: current.cloudiness.unwrap_or_default(),
        },
    );

    let tz = now.timezone();
    let today = now.date_naive();
    for slot in forecast {
        let begin = slot.begin.with_timezone(&tz);
        let day = if begin.date_naive() == today {
            "today".to_string()
        } else {
            begin.format("%A").to_string()
        };
        let header = format!("{day} <font size=\"2\">{}</font>", begin.format("%H:%M"));

        push_column(
            &mut html,
            &header,
            slot.conditions.icon.as_deref(),
            [slot.temperature_min.round(), slot.temperature_max.round()],
            ["°C", "°C"],
            Details {
                wind_speed: slot.wind_speed,
                rain_3h: slot.rain_3h,
                cloudiness: slot.cloudiness.unwrap_or_default(),
            },
        );
    }

    html.push_str("  </tr>\n</table>");
    html
}

/// Just the condition icon.
pub fn current_condition_html(icon: &str) -> String {
    format!("<img src=\"{ICON_BASE_URL}{icon}.png\">")
}

/// Compact table, one row per day: date, conditions, icon, temperature range, rain.
/// Expects days mapped with every field selected.
pub fn forecast_table_html(days: &[DailySlot]) -> String {
    let mut html = String::from("<table style=\"width:100%\">");
    html.push_str(&"<col>".repeat(5));

    for day in days {
        let date = day.begin.with_timezone(&Local).format("%m.%d.%y");
        let conditions = day
            .conditions
            .text
            .clone()
            .or_else(|| day.conditions.id.map(|id| id.to_string()))
            .unwrap_or_default();
        let icon = day.conditions.icon.as_deref().unwrap_or_default();
        let cloudiness = day.cloudiness.unwrap_or_default();
        let probability = day.rain_probability.unwrap_or_default().round();

        let _ = write!(
            html,
            "<tr>\
             <td style=\"white-space:nowrap;\">{date}</td>\
             <td style=\"white-space:nowrap;\">{conditions} ({cloudiness}%)</td>\
             <td><img src=\"{ICON_BASE_URL}{icon}.png\"></td>\
             <td style=\"white-space:nowrap;\">{:.1}°C - {:.1}°C</td>\
             <td style=\"white-space:nowrap;\">{probability}% {} mm</td>\
             </tr>",
            day.temperature.min, day.temperature.max, day.rain,
        );
    }

    html.push_str("</table>");
    html
}

struct Details {
    wind_speed: f64,
    rain_3h: f64,
    cloudiness: f64,
}

fn push_column(
    html: &mut String,
    header: &str,
    icon: Option<&str>,
    values: [f64; 2],
    units: [&str; 2],
    details: Details,
) {
    let _ = write!(
        html,
        "    <td align=\"center\" valign=\"top\" style=\"{CELL_STYLE}\">\n      {header}<br>\n"
    );
    if let Some(icon) = icon.filter(|i| !i.is_empty()) {
        let _ = writeln!(
            html,
            "      <img src=\"{ICON_BASE_URL}{icon}.png\" style=\"float: left; padding-left: 17px;\">"
        );
    }
    let _ = write!(
        html,
        "      <div style=\"float: right; font-size: 13px; padding-right: 17px;\">\n\
         \x20       {}{}<br>\n\
         \x20       {}{}<br>\n\
         \x20     </div>\n",
        values[0], units[0], values[1], units[1],
    );
    let _ = write!(
        html,
        "      <div style=\"clear: both; font-size: 11px; padding: 0px\">\n\
         \x20       <table>\n\
         \x20         <tr><td>Ø Wind</td><td>{}&nbsp;km/h</td></tr>\n\
         \x20         <tr><td>Rain 3h</td><td>{}&nbsp;mm</td></tr>\n\
         \x20         <tr><td>Cloudiness</td><td>{}&nbsp;%</td></tr>\n\
         \x20       </table>\n\
         \x20     </div>\n\
         \x20   </td>\n",
        details.wind_speed.round(),
        details.rain_3h,
        details.cloudiness,
    );
}

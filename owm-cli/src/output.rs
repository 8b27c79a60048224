//! Human-friendly printing of readings and call statistics.

use chrono::{DateTime, Local, Utc};
use owm_core::{
    CallStats, DataReading, OneCallReading, PollReport,
    meteo::DerivedReading,
    model::{Conditions, CurrentReading, ForecastSlot},
    provider::station::Station,
    stats::ApiLimit,
};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_report(report: &PollReport) {
    match report {
        PollReport::Data(reading) => print_data(reading),
        PollReport::OneCall(reading) => print_onecall(reading),
    }
}

pub fn print_data(reading: &DataReading) {
    print_current(&reading.current);
    if !reading.forecast.is_empty() {
        println!();
        print_forecast(&reading.forecast);
    }
}

pub fn print_current(current: &CurrentReading) {
    let obs = &current.observation;

    println!("Measured at:  {}", local(current.measured_at));
    println!("Temperature:  {:.1} °C", obs.temperature);
    println!("Humidity:     {:.0} %", obs.humidity);
    println!("Pressure:     {:.0} hPa", obs.pressure);
    println!("Wind:         {:.0} km/h", obs.wind_speed);
    if let Some(angle) = current.wind_angle {
        println!("Wind angle:   {angle}°");
    }
    println!("Rain 3h:      {} mm", current.rain_3h);
    println!("Snow 3h:      {} mm", current.snow_3h);
    if let Some(clouds) = current.cloudiness {
        println!("Cloudiness:   {clouds} %");
    }
    print_conditions(&current.conditions);
    print_derived(&current.derived);
}

pub fn print_forecast(slots: &[ForecastSlot]) {
    println!("3-hour forecast:");
    for slot in slots {
        let mut line = format!(
            "  {}  {:>5.1} .. {:>5.1} °C  {:>3.0} km/h",
            local(slot.begin),
            slot.temperature_min,
            slot.temperature_max,
            slot.wind_speed,
        );
        if let Some(text) = &slot.derived.compass_text {
            line.push_str(&format!(" {text}"));
        }
        if let Some(pop) = slot.rain_probability {
            line.push_str(&format!("  rain {pop:.0} %"));
        }
        if let Some(text) = &slot.conditions.text {
            line.push_str(&format!("  {text}"));
        }
        println!("{line}");
    }
}

pub fn print_onecall(reading: &OneCallReading) {
    let current = &reading.current;
    let obs = &current.observation;

    println!("Measured at:  {}", local(current.measured_at));
    println!("Temperature:  {:.1} °C", obs.temperature);
    println!("Humidity:     {:.0} %", obs.humidity);
    println!("Pressure:     {:.0} hPa", obs.pressure);
    println!("Wind:         {:.0} km/h (gusts {} km/h)", obs.wind_speed, current.wind_gust);
    if let Some(uvi) = current.uv_index {
        println!("UV index:     {uvi}");
    }
    println!("Rain 1h:      {} mm", current.rain_1h);
    println!("Snow 1h:      {} mm", current.snow_1h);
    if let Some(clouds) = current.cloudiness {
        println!("Cloudiness:   {clouds} %");
    }
    print_conditions(&current.conditions);
    print_derived(&current.derived);

    if !reading.minutely.is_empty() {
        let total: f64 = reading.minutely.iter().map(|m| m.precipitation).sum();
        println!();
        println!(
            "Next {} minutes: {:.2} mm/h precipitation on average",
            reading.minutely.len(),
            total / reading.minutely.len() as f64
        );
    }

    if !reading.hourly.is_empty() {
        println!();
        println!("Hourly forecast:");
        for h in &reading.hourly {
            println!(
                "  {}  {:>5.1} °C  {:>3.0} km/h  {}",
                local(h.begin),
                h.temperature,
                h.wind_speed,
                h.conditions.text.as_deref().unwrap_or_default()
            );
        }
    }

    if !reading.daily.is_empty() {
        println!();
        println!("Daily forecast:");
        for d in &reading.daily {
            println!(
                "  {}  {:>5.1} .. {:>5.1} °C  {:>3.0} km/h  rain {} mm  {}",
                d.begin.with_timezone(&Local).format("%a %d.%m."),
                d.temperature.min,
                d.temperature.max,
                d.wind_speed,
                d.rain,
                d.conditions.text.as_deref().unwrap_or_default()
            );
        }
    }
}

pub fn print_stations(stations: &[Station]) {
    if stations.is_empty() {
        println!("No stations registered.");
        return;
    }
    for s in stations {
        println!(
            "{}  {:<20} {:<16} {:.4}, {:.4} ({} m)",
            s.id, s.name, s.external_id, s.latitude, s.longitude, s.altitude
        );
    }
}

pub fn print_stats(stats: &CallStats) {
    println!();
    println!(
        "API calls: {} total, {} failed, last {} kept",
        stats.total(),
        stats.failed(),
        stats.len()
    );

    let now = Utc::now();
    for limit in stats.limits() {
        println!("{}", limit_line(limit, stats.usage(limit, now)));
    }

    for record in stats.records() {
        let outcome = match record.status {
            Some(status) => format!("{} ({})", record.error, status.code()),
            None => "ok".to_string(),
        };
        println!(
            "  {}  {:>6} ms  {}  {}",
            local(record.timestamp),
            record.duration.as_millis(),
            outcome,
            record.url
        );
    }
}

/// Prints nothing for an empty body.
pub fn print_raw(body: Option<&str>) {
    if let Some(body) = body {
        println!("{body}");
    }
}

/// Only calls of this process are known, so the count is not the account's usage.
fn limit_line(limit: &ApiLimit, used: usize) -> String {
    format!("  limit {limit}: {used} used in this session")
}

fn print_conditions(conditions: &Conditions) {
    if let Some(text) = &conditions.text {
        println!("Conditions:   {text}");
    }
    if let Some(id) = conditions.id {
        println!("Condition id: {id}");
    }
    if let Some(icon) = &conditions.icon {
        println!("Icon:         {icon}");
    }
}

fn print_derived(derived: &DerivedReading) {
    if let Some(v) = derived.dewpoint {
        println!("Dewpoint:     {v} °C");
    }
    if let Some(v) = derived.absolute_humidity {
        println!("Abs. humid.:  {v} g/m³");
    }
    if let Some(v) = derived.absolute_pressure {
        println!("Abs. press.:  {v:.1} hPa");
    }
    if let Some(v) = derived.windchill {
        println!("Windchill:    {v} °C");
    }
    if let Some(v) = derived.heatindex {
        println!("Heat index:   {v} °C");
    }
    match (derived.beaufort_force, &derived.beaufort_text) {
        (Some(bft), Some(text)) => println!("Wind force:   {bft} Bft ({text})"),
        (Some(bft), None) => println!("Wind force:   {bft} Bft"),
        (None, Some(text)) => println!("Wind force:   {text}"),
        (None, None) => {}
    }
    if let Some(text) = &derived.compass_text {
        println!("Direction:    {text}");
    }
}

fn local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

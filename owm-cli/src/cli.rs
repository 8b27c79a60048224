use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, CustomType, MultiSelect, Password, PasswordDisplayMode, Select, Text};
use owm_core::{
    ApiClient, Config, Coordinates, EndpointId, FieldSelection, PollError, Status, StatusClass,
    config::OneCallVersion,
    provider::{
        client_from_config, current, onecall, source_for,
        station::{self, Aggregation, Measurement, MeasurementQuery},
    },
};

use crate::output;

/// How results are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMode {
    pub json: bool,
    pub raw: bool,
}

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "owm", version, about = "OpenWeatherMap CLI")]
pub struct Cli {
    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Print the API call history when done.
    #[arg(long, global = true)]
    pub stats: bool,

    /// Also print the body of the last API response, as received.
    #[arg(long, global = true)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set API key, location and the values to produce.
    Configure,

    /// Show the current weather.
    Current,

    /// Show the 3-hour forecast.
    Forecast,

    /// Show current weather and forecasts of the one-call endpoint.
    Onecall,

    /// Print the HTML summary of current weather and 3-hour forecast.
    Summary,

    /// Poll an endpoint every `update_interval` minutes until interrupted.
    Watch {
        /// Endpoint to poll, "data" or "onecall".
        #[arg(long, default_value = "data")]
        endpoint: String,
    },

    /// Manage a personal weather station.
    #[command(subcommand)]
    Station(StationCommand),
}

#[derive(Debug, Subcommand)]
pub enum StationCommand {
    /// Register the configured station; prints the assigned id.
    Register,
    /// Push name and location of the configured station.
    Update,
    /// List all stations of the account.
    List,
    /// Delete a station by id.
    Delete { station_id: String },
    /// Transmit one measurement.
    Transmit(MeasurementArgs),
    /// Transmit the measurement in FILE every `transmit_interval` minutes until interrupted.
    ///
    /// FILE holds one JSON object with the fields of `transmit`; it is read again before
    /// every transmission, so another program can keep it current.
    Watch { file: PathBuf },
    /// Fetch aggregated measurements.
    Fetch {
        /// RFC 3339 start; defaults to 24 hours ago.
        #[arg(long)]
        from: Option<String>,
        /// RFC 3339 end; defaults to now.
        #[arg(long)]
        to: Option<String>,
        /// Aggregation: m, h or d.
        #[arg(long = "type", default_value = "m")]
        aggregation: String,
        #[arg(long, default_value_t = station::DEFAULT_FETCH_LIMIT)]
        limit: u32,
    },
}

#[derive(Debug, Args)]
pub struct MeasurementArgs {
    /// Unix timestamp of the measurement; defaults to now.
    #[arg(long)]
    pub dt: Option<i64>,
    #[arg(long)]
    pub temperature: Option<f64>,
    /// m/s
    #[arg(long)]
    pub wind_speed: Option<f64>,
    /// m/s
    #[arg(long)]
    pub wind_gust: Option<f64>,
    #[arg(long)]
    pub wind_deg: Option<f64>,
    #[arg(long)]
    pub pressure: Option<f64>,
    #[arg(long)]
    pub humidity: Option<f64>,
    #[arg(long)]
    pub rain_1h: Option<f64>,
    #[arg(long)]
    pub rain_6h: Option<f64>,
    #[arg(long)]
    pub rain_24h: Option<f64>,
    #[arg(long)]
    pub snow_1h: Option<f64>,
    #[arg(long)]
    pub snow_6h: Option<f64>,
    #[arg(long)]
    pub snow_24h: Option<f64>,
}

impl From<MeasurementArgs> for Measurement {
    fn from(a: MeasurementArgs) -> Self {
        Measurement {
            dt: a.dt,
            temperature: a.temperature,
            wind_speed: a.wind_speed,
            wind_gust: a.wind_gust,
            wind_deg: a.wind_deg,
            pressure: a.pressure,
            humidity: a.humidity,
            rain_1h: a.rain_1h,
            rain_6h: a.rain_6h,
            rain_24h: a.rain_24h,
            snow_1h: a.snow_1h,
            snow_6h: a.snow_6h,
            snow_24h: a.snow_24h,
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        let mode = OutputMode {
            json: self.json,
            raw: self.raw,
        };

        let endpoint = match &self.command {
            Command::Configure => return configure(&mut config),
            Command::Onecall => EndpointId::OneCall,
            Command::Watch { endpoint } => EndpointId::try_from(endpoint.as_str())?,
            Command::Station(_) => EndpointId::Station,
            Command::Current | Command::Forecast | Command::Summary => EndpointId::Data,
        };

        ensure_active(&config)?;
        let mut client = client_from_config(endpoint, &config)?;

        let result = self.command.execute(&mut client, &mut config, mode).await;

        if self.stats {
            output::print_stats(client.stats());
        }
        result
    }
}

impl Command {
    async fn execute(
        self,
        client: &mut ApiClient,
        config: &mut Config,
        mode: OutputMode,
    ) -> anyhow::Result<()> {
        let polls_once = !matches!(
            self,
            Command::Watch { .. } | Command::Station(StationCommand::Watch { .. })
        );
        let json = mode.json;

        match self {
            Command::Configure => configure(config)?,
            Command::Current => {
                let reading = current::poll_current(client, config).await?;
                if json {
                    output::print_json(&reading)?;
                } else {
                    output::print_current(&reading);
                }
            }
            Command::Forecast => {
                if config.data.hourly_forecast_count == 0 {
                    bail!(
                        "The 3-hour forecast is disabled.\n\
                         Hint: set `hourly_forecast_count` in the [data] section of {}.",
                        Config::config_file_path()?.display()
                    );
                }
                let slots = current::poll_forecast(client, config).await?;
                if json {
                    output::print_json(&slots)?;
                } else {
                    output::print_forecast(&slots);
                }
            }
            Command::Onecall => {
                let reading = onecall::poll_onecall(client, config).await?;
                if json {
                    output::print_json(&reading)?;
                } else {
                    output::print_onecall(&reading);
                }
            }
            Command::Summary => {
                let mut summary_config = config.clone();
                summary_config.data.with_summary = true;
                let reading = current::poll_data(client, &summary_config).await?;
                println!("{}", reading.summary_html.unwrap_or_default());
            }
            Command::Watch { endpoint } => {
                let id = EndpointId::try_from(endpoint.as_str())?;
                watch(id, client, config, mode).await?;
            }
            Command::Station(cmd) => cmd.execute(client, config, mode).await?,
        }

        if mode.raw && polls_once {
            output::print_raw(client.last_raw_body());
        }
        Ok(())
    }
}

impl StationCommand {
    async fn execute(
        self,
        client: &mut ApiClient,
        config: &mut Config,
        mode: OutputMode,
    ) -> anyhow::Result<()> {
        let json = mode.json;

        match self {
            StationCommand::Register => {
                let registered = station::register_station(client, config).await?;
                config.station.station_id = Some(registered.id.clone());
                config.save()?;
                if json {
                    output::print_json(&registered)?;
                } else {
                    println!("Registered station {}; id saved to the config.", registered.id);
                }
            }
            StationCommand::Update => {
                let updated = station::update_station(client, config).await?;
                match updated {
                    Some(s) if json => output::print_json(&s)?,
                    Some(s) => output::print_stations(std::slice::from_ref(&s)),
                    None => println!("Station updated."),
                }
            }
            StationCommand::List => {
                let stations = station::list_stations(client, config).await?;
                if json {
                    output::print_json(&stations)?;
                } else {
                    output::print_stations(&stations);
                }
            }
            StationCommand::Delete { station_id } => {
                station::delete_station(client, config, &station_id).await?;
                if config.station.station_id.as_deref() == Some(station_id.trim()) {
                    config.station.station_id = None;
                    config.save()?;
                }
                println!("Deleted station {station_id}.");
            }
            StationCommand::Transmit(args) => {
                let at = station::transmit_measurements(client, config, &args.into()).await?;
                println!("Measurement transmitted at {}.", at.to_rfc3339());
            }
            StationCommand::Watch { file } => watch_station(client, config, &file, mode).await?,
            StationCommand::Fetch {
                from,
                to,
                aggregation,
                limit,
            } => {
                let query = MeasurementQuery {
                    from: from.as_deref().map(parse_time).transpose()?,
                    to: to.as_deref().map(parse_time).transpose()?,
                    aggregation: Aggregation::try_from(aggregation.as_str())?,
                    limit,
                };
                let data = station::fetch_measurements(client, config, &query).await?;
                output::print_json(&data)?;
            }
        }

        Ok(())
    }
}

/// Refuse to run while the configuration keeps the instance from polling.
fn ensure_active(config: &Config) -> anyhow::Result<()> {
    let status = config.initial_status();
    if status.class() != StatusClass::Invalid {
        return Ok(());
    }

    let mut msg = status.to_string();
    for problem in config.check() {
        msg.push_str(&format!("\n  - {problem}"));
    }
    if status == Status::InvalidConfig {
        msg.push_str("\nHint: run `owm configure`.");
    }
    bail!(msg)
}

async fn watch(
    id: EndpointId,
    client: &mut ApiClient,
    config: &Config,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let source = source_for(id)?;
    let Some(period) = config.update_interval() else {
        bail!("Polling is disabled (update_interval = 0).");
    };

    let mut status = config.initial_status();
    let mut ticker = tokio::time::interval(period);
    tracing::info!(endpoint = %id, ?period, "watching");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match source.update(client, config).await {
                    Ok(report) => {
                        if status != Status::Active {
                            tracing::info!(previous = %status, "poll succeeded again");
                            status = Status::Active;
                        }
                        if mode.json {
                            output::print_json(&report)?;
                        } else {
                            println!("--- {} ---", report.measured_at().to_rfc3339());
                            output::print_report(&report);
                        }
                    }
                    // previous reading stays valid; remote failures retry on the next tick
                    Err(err) => status = status_after_failure(err)?,
                }
                if mode.raw {
                    output::print_raw(client.last_raw_body());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    Ok(())
}

async fn watch_station(
    client: &mut ApiClient,
    config: &Config,
    file: &Path,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let Some(period) = config.transmit_interval() else {
        bail!("Transmission is disabled (transmit_interval = 0).");
    };

    let mut ticker = tokio::time::interval(period);
    tracing::info!(file = %file.display(), ?period, "transmitting");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let measurement = match read_measurement(file) {
                    Ok(measurement) => measurement,
                    Err(err) => {
                        tracing::warn!(error = %format!("{err:#}"), "skipping transmission");
                        continue;
                    }
                };
                match station::transmit_measurements(client, config, &measurement).await {
                    Ok(at) => println!("Measurement transmitted at {}.", at.to_rfc3339()),
                    Err(err) => {
                        status_after_failure(err)?;
                    }
                }
                if mode.raw {
                    output::print_raw(client.last_raw_body());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    Ok(())
}

/// Status to go on with after a failed poll. Configuration errors end the loop,
/// since the configuration is not reloaded while it runs.
fn status_after_failure(err: PollError) -> anyhow::Result<Status> {
    let status = err.status();
    if status.class() == StatusClass::Invalid {
        return Err(anyhow::Error::new(err).context("Stopped"));
    }
    tracing::warn!(%status, error = %err, "poll failed");
    Ok(status)
}

fn read_measurement(path: &Path) -> anyhow::Result<Measurement> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read measurement file: {}", path.display()))?;
    parse_measurement(&contents)
        .with_context(|| format!("Failed to parse measurement file: {}", path.display()))
}

fn parse_measurement(contents: &str) -> anyhow::Result<Measurement> {
    Ok(serde_json::from_str(contents)?)
}

fn parse_time(value: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid time '{value}', expected RFC 3339"))
}

fn configure(config: &mut Config) -> anyhow::Result<()> {
    let api_key = Password::new("OpenWeatherMap API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key);
    }

    let own_location = Confirm::new("Use your own location (instead of the system location)?")
        .with_default(config.location.is_some())
        .prompt()?;
    if own_location {
        let current = config.location.unwrap_or(Coordinates {
            latitude: 0.0,
            longitude: 0.0,
        });
        let latitude = CustomType::<f64>::new("Latitude:")
            .with_default(current.latitude)
            .prompt()?;
        let longitude = CustomType::<f64>::new("Longitude:")
            .with_default(current.longitude)
            .prompt()?;
        config.location = Some(Coordinates {
            latitude,
            longitude,
        });
    } else {
        config.location = None;
    }

    config.altitude = CustomType::<f64>::new("Altitude (m):")
        .with_default(config.altitude)
        .prompt()?;

    let lang = Text::new("Language (empty = from $LANG):")
        .with_default(config.lang.as_deref().unwrap_or_default())
        .prompt()?;
    config.lang = (!lang.trim().is_empty()).then(|| lang.trim().to_string());

    config.update_interval = CustomType::<u32>::new("Update interval (minutes, 0 = off):")
        .with_default(config.update_interval)
        .prompt()?;

    configure_fields(&mut config.fields)?;

    config.data.hourly_forecast_count = CustomType::<usize>::new("3-hour forecast slots (0-40):")
        .with_default(config.data.hourly_forecast_count)
        .prompt()?;

    let versions = vec!["2.5", "3.0"];
    let start = usize::from(config.onecall.api_version == OneCallVersion::V3_0);
    config.onecall.api_version = match Select::new("One-call API version:", versions)
        .with_starting_cursor(start)
        .prompt()?
    {
        "3.0" => OneCallVersion::V3_0,
        _ => OneCallVersion::V2_5,
    };

    let problems = config.check();
    config.save()?;

    println!("Saved to {}", Config::config_file_path()?.display());
    for problem in problems {
        println!("  warning: {problem}");
    }
    Ok(())
}

fn configure_fields(fields: &mut FieldSelection) -> anyhow::Result<()> {
    let mut flags: Vec<(&str, &mut bool)> = vec![
        ("dewpoint", &mut fields.dewpoint),
        ("absolute humidity", &mut fields.absolute_humidity),
        ("absolute pressure", &mut fields.absolute_pressure),
        ("windchill", &mut fields.windchill),
        ("heat index", &mut fields.heatindex),
        ("UV index", &mut fields.uv_index),
        ("wind strength (Bft)", &mut fields.windstrength),
        ("wind strength as text", &mut fields.windstrength_text),
        ("wind angle", &mut fields.windangle),
        ("wind direction", &mut fields.winddirection),
        ("rain probability", &mut fields.rain_probability),
        ("cloudiness", &mut fields.cloudiness),
        ("conditions", &mut fields.conditions),
        ("condition icon", &mut fields.icon),
        ("condition id", &mut fields.condition_id),
    ];

    let names: Vec<&str> = flags.iter().map(|(name, _)| *name).collect();
    let selected: Vec<usize> = flags
        .iter()
        .enumerate()
        .filter(|(_, (_, on))| **on)
        .map(|(i, _)| i)
        .collect();

    let chosen = MultiSelect::new("Values to produce:", names)
        .with_default(&selected)
        .prompt()?;

    for (name, flag) in flags {
        *flag = chosen.contains(&name);
    }
    Ok(())
}

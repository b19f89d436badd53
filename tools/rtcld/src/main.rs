mod port;

use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::{Local, TimeZone, Utc};
use dialoguer::console::style;
use rtcld_core::{
    DetectionResult, Field, HourFlagSource, Pacing, PartialDateTime, Rtc, RtcConfig, Snapshot, Status,
};
use structopt::StructOpt;
use tracing::{Level, info, warn};
use tracing_subscriber::util::SubscriberInitExt;

use crate::port::{Link, PortConfig};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, PartialEq, StructOpt)]
#[structopt(name = "rtcld", about = "cartridge real-time clock loader")]
struct Opt {
    #[structopt(flatten)]
    port: PortConfig,

    /// Pause after every GPIO register write, in microseconds
    #[structopt(long, default_value = "0")]
    pace_us: u64,

    /// Report a clock that is not in 24-hour mode as unusable
    #[structopt(long)]
    strict: bool,

    /// Read the 24-hour flag of a backup from its first byte instead of the status byte
    #[structopt(long)]
    leading_hour_flag: bool,

    /// -v for info, -vv for debug, -vvv to trace every frame
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,

    #[structopt(subcommand)]
    subcommand: Subcommands,
}

#[derive(Debug, PartialEq, StructOpt)]
enum Subcommands {
    /// Check whether the cartridge has a working clock
    Detect,
    /// Print status and time
    Read,
    /// Set the clock from this computer's local time
    Sync {
        /// Seconds added to the host time, to cover the write itself
        #[structopt(long, default_value = "1", allow_hyphen_values = true)]
        offset: i64,

        /// Write UTC instead of local time
        #[structopt(long)]
        utc: bool,
    },
    /// Zero the clock and put it in 24-hour mode
    Reset,
    /// Save the clock to a 16-byte file
    Backup { file: PathBuf },
    /// Write a 16-byte backup back to the clock
    Restore { file: PathBuf },
    /// Print the time until interrupted
    Watch {
        #[structopt(long, default_value = "1000")]
        interval_ms: u64,
    },
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .compact()
        .finish()
        .init();
}

fn main() -> anyhow::Result<()> {
    let opt: Opt = Opt::from_args();
    setup_logging(opt.verbose);

    let config = RtcConfig {
        pacing: match opt.pace_us {
            0 => Pacing::None,
            us => Pacing::Fixed(Duration::from_micros(us)),
        },
        hour_flag_source: if opt.leading_hour_flag {
            HourFlagSource::Leading
        } else {
            HourFlagSource::Status
        },
        strict_hour_mode: opt.strict,
    };
    let mut rtc = Rtc::with_config(opt.port.open()?, config);

    match opt.subcommand {
        Subcommands::Detect => detect(&mut rtc),
        Subcommands::Read => read(&mut rtc),
        Subcommands::Sync { offset, utc } => sync(&mut rtc, offset, utc),
        Subcommands::Reset => reset(&mut rtc),
        Subcommands::Backup { file } => backup(&mut rtc, file),
        Subcommands::Restore { file } => restore(&mut rtc, file),
        Subcommands::Watch { interval_ms } => watch(&mut rtc, Duration::from_millis(interval_ms)),
    }
}

fn detect(rtc: &mut Rtc<Link>) -> anyhow::Result<()> {
    let result = rtc.detect().context("detection failed")?;
    let styled = match result {
        DetectionResult::Present => style(result).green(),
        DetectionResult::Absent => style(result).red(),
        _ => style(result).yellow(),
    };
    println!("RTC {}", styled);
    Ok(())
}

fn read(rtc: &mut Rtc<Link>) -> anyhow::Result<()> {
    let status = rtc.read_status().context("failed to read status")?;
    println!("Status: {:02X}", status.bits());
    if status.power_lost() {
        println!("{}", style("Battery ran out, the time below is meaningless").yellow());
    }

    let date_time = rtc.read_date_time().context("failed to read time")?;
    println!("Time:   {}", format_partial(&date_time));
    Ok(())
}

/// Seconds since the epoch of the wall-clock reading in `now`'s zone.
///
/// The chip keeps no zone, so the local reading is written as if it were UTC.
fn wall_clock_secs<Tz: TimeZone>(now: &chrono::DateTime<Tz>) -> i64 {
    now.naive_local().and_utc().timestamp()
}

fn sync(rtc: &mut Rtc<Link>, offset: i64, utc: bool) -> anyhow::Result<()> {
    let found = rtc.recover_power_loss().context("failed to check power")?;
    if found.power_lost() {
        println!("{}", style("Battery ran out, clock was reset").yellow());
    }

    let now = if utc { wall_clock_secs(&Utc::now()) } else { wall_clock_secs(&Local::now()) };
    let target = now
        .checked_add(offset)
        .and_then(|secs| u64::try_from(secs).ok())
        .ok_or_else(|| anyhow!("offset {} puts the time before 1970", offset))?;

    let written = rtc.sync_to(target).context("failed to set time")?;
    info!("synced to {}", target);
    println!("{} {} {}", style("Set to").green(), written, WEEKDAYS[written.weekday as usize]);
    Ok(())
}

fn reset(rtc: &mut Rtc<Link>) -> anyhow::Result<()> {
    rtc.reset().context("reset failed")?;
    rtc.write_status(Status::HOUR_24).context("failed to set 24-hour mode")?;
    println!("{}", style("Clock reset").green());
    Ok(())
}

fn backup(rtc: &mut Rtc<Link>, file: PathBuf) -> anyhow::Result<()> {
    let snapshot = rtc.capture().context("failed to read clock")?;
    snapshot
        .save(&file)
        .with_context(|| format!("failed to write {}", file.display()))?;

    let mode = match rtc.cached_is_24_hour() {
        Some(false) => "12-hour",
        _ => "24-hour",
    };
    println!("Saved {} ({}) to {}", format_partial(&snapshot.date_time()), mode, file.display());
    Ok(())
}

fn restore(rtc: &mut Rtc<Link>, file: PathBuf) -> anyhow::Result<()> {
    let snapshot =
        Snapshot::load(&file).with_context(|| format!("failed to read {}", file.display()))?;
    if snapshot.is_blank() {
        warn!("{} is blank, restoring reset values", file.display());
    }

    rtc.restore(&snapshot).context("failed to write clock")?;
    println!("{}", style("Restored").green());
    Ok(())
}

fn watch(rtc: &mut Rtc<Link>, interval: Duration) -> anyhow::Result<()> {
    loop {
        let date_time = rtc.read_date_time().context("failed to read time")?;
        println!("{}", format_partial(&date_time));
        sleep(interval);
    }
}

fn format_partial(date_time: &PartialDateTime) -> String {
    if let Some(complete) = date_time.complete() {
        return format!("{} {}", complete, WEEKDAYS[complete.weekday as usize]);
    }

    let field = |f: Field| match date_time.get(f) {
        Some(v) => format!("{:02}", v),
        None => style("??").red().to_string(),
    };
    format!(
        "20{}-{}-{} {}:{}:{}",
        field(Field::Year),
        field(Field::Month),
        field(Field::Day),
        field(Field::Hour),
        field(Field::Minute),
        field(Field::Second)
    )
}

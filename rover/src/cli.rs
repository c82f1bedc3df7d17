use std::path::PathBuf;

use anyhow::Result;
use clap::{value_parser, Arg, ArgMatches};

use crate::{
    config::{GgaMode, NtripSettings, Settings},
    framer::ErrorPolicy,
};

pub struct CommandBuilder {
    command: clap::Command,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuilder {
    pub fn new() -> Self {
        let command = clap::Command::new("rover")
            .version(clap::crate_version!())
            .about("RTK rover: receiver link, commands and NTRIP correction relay")
            .arg(
                Arg::new("config")
                    .value_name("file")
                    .short('c')
                    .long("config")
                    .value_parser(value_parser!(PathBuf))
                    .help("JSON settings file, flags override its values"),
            )
            .arg(
                Arg::new("port")
                    .value_name("port")
                    .short('p')
                    .long("port")
                    .help("Serial port of the receiver's UBX and NMEA link"),
            )
            .arg(
                Arg::new("baud")
                    .value_name("baud")
                    .short('s')
                    .long("baud")
                    .value_parser(value_parser!(u32))
                    .help("Baud rate of the receiver link"),
            )
            .arg(
                Arg::new("correction-port")
                    .value_name("port")
                    .long("correction-port")
                    .help("Serial port RTCM3 corrections are written to"),
            )
            .arg(
                Arg::new("correction-baud")
                    .value_name("baud")
                    .long("correction-baud")
                    .value_parser(value_parser!(u32))
                    .help("Baud rate of the correction port"),
            )
            .arg(
                Arg::new("update-rate")
                    .value_name("ms")
                    .long("update-rate")
                    .value_parser(value_parser!(u32))
                    .help("Measurement period set at startup, 50 to 5000 ms"),
            )
            .arg(
                Arg::new("error-policy")
                    .long("error-policy")
                    .value_parser(["ignore", "log", "raise"])
                    .help("Handling of frames that fail to decode"),
            )
            .arg(
                Arg::new("ntrip-server")
                    .value_name("host")
                    .long("ntrip-server")
                    .help("NTRIP caster, enables the correction relay"),
            )
            .arg(
                Arg::new("ntrip-port")
                    .value_name("port")
                    .long("ntrip-port")
                    .value_parser(value_parser!(u16))
                    .help("NTRIP caster port"),
            )
            .arg(
                Arg::new("mountpoint")
                    .long("mountpoint")
                    .help("Mountpoint to stream, omit to pick the nearest from the sourcetable"),
            )
            .arg(Arg::new("user").long("user").help("NTRIP user name"))
            .arg(Arg::new("password").long("password").help("NTRIP password"))
            .arg(
                Arg::new("gga-mode")
                    .long("gga-mode")
                    .value_parser(["live", "fixed"])
                    .help("Send the receiver's own GGA or one built from the reference position"),
            )
            .arg(
                Arg::new("gga-interval")
                    .value_name("secs")
                    .long("gga-interval")
                    .value_parser(value_parser!(u64))
                    .help("Seconds between GGA sentences sent to the caster, 0 disables them"),
            )
            .arg(
                Arg::new("reachability-probe")
                    .long("reachability-probe")
                    .action(clap::ArgAction::SetTrue)
                    .help("Pause the relay while the caster cannot be reached"),
            )
            .arg(
                Arg::new("log-file")
                    .long("log-file")
                    .action(clap::ArgAction::SetTrue)
                    .help("Log to a file in the data directory instead of stdout"),
            );
        Self { command }
    }

    pub fn build(&self) -> clap::Command {
        self.command.clone()
    }
}

pub fn log_to_file(matches: &ArgMatches) -> bool {
    matches.get_flag("log-file")
}

/// Settings file named on the command line, or the defaults, with every flag
/// given applied on top
pub fn settings(matches: &ArgMatches) -> Result<Settings> {
    let mut settings = match matches.get_one::<PathBuf>("config") {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    apply(matches, &mut settings);
    Ok(settings)
}

pub fn apply(matches: &ArgMatches, settings: &mut Settings) {
    if let Some(port) = matches.get_one::<String>("port") {
        settings.receiver.port = port.clone();
    }
    if let Some(baud) = matches.get_one::<u32>("baud") {
        settings.receiver.baud = *baud;
    }
    if let Some(port) = matches.get_one::<String>("correction-port") {
        settings.corrections.port = port.clone();
    }
    if let Some(baud) = matches.get_one::<u32>("correction-baud") {
        settings.corrections.baud = *baud;
    }
    if let Some(rate) = matches.get_one::<u32>("update-rate") {
        settings.startup.update_rate_ms = Some(*rate);
    }
    match matches.get_one::<String>("error-policy").map(|s| s.as_str()) {
        Some("ignore") => settings.error_policy = ErrorPolicy::Ignore,
        Some("log") => settings.error_policy = ErrorPolicy::Log,
        Some("raise") => settings.error_policy = ErrorPolicy::Raise,
        _ => {},
    }
    if matches.get_flag("reachability-probe") {
        settings.reachability_probe = true;
    }

    let ntrip_args = [
        "ntrip-server",
        "ntrip-port",
        "mountpoint",
        "user",
        "password",
        "gga-mode",
        "gga-interval",
    ];
    if !ntrip_args.iter().any(|id| matches.contains_id(id)) {
        return;
    }
    let ntrip = settings.ntrip.get_or_insert_with(NtripSettings::default);
    if let Some(server) = matches.get_one::<String>("ntrip-server") {
        ntrip.server = server.clone();
    }
    if let Some(port) = matches.get_one::<u16>("ntrip-port") {
        ntrip.port = *port;
    }
    if let Some(mountpoint) = matches.get_one::<String>("mountpoint") {
        ntrip.mountpoint = mountpoint.clone();
    }
    if let Some(user) = matches.get_one::<String>("user") {
        ntrip.user = Some(user.clone());
    }
    if let Some(password) = matches.get_one::<String>("password") {
        ntrip.password = password.clone();
    }
    match matches.get_one::<String>("gga-mode").map(|s| s.as_str()) {
        Some("live") => ntrip.gga_mode = GgaMode::Live,
        Some("fixed") => ntrip.gga_mode = GgaMode::Fixed,
        _ => {},
    }
    if let Some(secs) = matches.get_one::<u64>("gga-interval") {
        ntrip.gga_interval_secs = (*secs > 0).then_some(*secs);
    }
}

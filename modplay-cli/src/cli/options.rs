//! Resolve playback settings and run options from parsed arguments.

use clap::ArgMatches;
use modplay_lib::engine::Interpolation;
use modplay_lib::settings::PlayerSettings;
use modplay_lib::SettingsError;

/// Everything the runner needs from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub files: Vec<String>,
    pub start: usize,
    pub shuffle: bool,
    pub loop_list: bool,
    pub loop_module: bool,
    pub null_output: bool,
    pub interactive: bool,
    pub json_events: bool,
    pub settings: PlayerSettings,
}

/// Build run options, layering flag overrides over the settings file.
pub fn resolve(args: &ArgMatches) -> Result<RunOptions, SettingsError> {
    let mut settings = match args.get_one::<String>("settings") {
        Some(path) => PlayerSettings::load(path)?,
        None => PlayerSettings::default(),
    };

    if let Some(rate) = args.get_one::<u32>("rate") {
        settings.sample_rate = *rate;
    }
    if let Some(buffer_ms) = args.get_one::<u32>("buffer-ms") {
        settings.buffer_ms = *buffer_ms;
    }
    if args.get_flag("mono") {
        settings.stereo = false;
    }
    if let Some(amplification) = args.get_one::<u8>("amplification") {
        settings.amplification = *amplification;
    }
    if let Some(separation) = args.get_one::<u8>("pan-separation") {
        settings.pan_separation = *separation;
    }
    if let Some(mode) = args.get_one::<String>("interpolation") {
        settings.interpolation = match mode.as_str() {
            "nearest" => Interpolation::Nearest,
            "spline" => Interpolation::Spline,
            _ => Interpolation::Linear,
        };
        settings.interpolate = true;
    }
    if args.get_flag("no-filter") {
        settings.lowpass_filter = false;
    }
    if let Some(watchdog_ms) = args.get_one::<u64>("watchdog-ms") {
        settings.watchdog_timeout_ms = *watchdog_ms;
    }

    Ok(RunOptions {
        files: args
            .get_many::<String>("FILES")
            .map(|files| files.cloned().collect())
            .unwrap_or_default(),
        start: args.get_one::<usize>("start").copied().unwrap_or(0),
        shuffle: args.get_flag("shuffle"),
        loop_list: args.get_flag("loop-list"),
        loop_module: args.get_flag("loop"),
        null_output: args.get_flag("null-output"),
        interactive: !args.get_flag("no-input"),
        json_events: args.get_flag("json-events"),
        settings,
    })
}

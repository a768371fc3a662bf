//! CLI argument definitions for `modplay`.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("modplay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play tracker modules and audio files from a queue")
        .arg_required_else_help(true)
        .subcommand_negates_reqs(true)
        .arg(
            Arg::new("FILES")
                .help("Files to queue, in order")
                .required(true)
                .num_args(1..)
                .index(1),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .short('s')
                .value_name("INDEX")
                .value_parser(value_parser!(usize))
                .default_value("0")
                .help("Queue position to start from"),
        )
        .arg(
            Arg::new("shuffle")
                .long("shuffle")
                .short('z')
                .action(ArgAction::SetTrue)
                .help("Shuffle the queue, keeping the start track first"),
        )
        .arg(
            Arg::new("loop-list")
                .long("loop-list")
                .short('l')
                .action(ArgAction::SetTrue)
                .help("Start over after the last track"),
        )
        .arg(
            Arg::new("loop")
                .long("loop")
                .action(ArgAction::SetTrue)
                .help("Repeat each module instead of moving on when it loops"),
        )
        .arg(
            Arg::new("settings")
                .long("settings")
                .short('c')
                .value_name("PATH")
                .help("Path to a JSON settings file"),
        )
        .arg(
            Arg::new("rate")
                .long("rate")
                .short('r')
                .value_name("HZ")
                .value_parser(value_parser!(u32))
                .help("Output sample rate"),
        )
        .arg(
            Arg::new("buffer-ms")
                .long("buffer-ms")
                .value_name("MS")
                .value_parser(value_parser!(u32))
                .help("Length of one frame batch in milliseconds"),
        )
        .arg(
            Arg::new("mono")
                .long("mono")
                .action(ArgAction::SetTrue)
                .help("Render mono output"),
        )
        .arg(
            Arg::new("amplification")
                .long("amplification")
                .short('a')
                .value_name("FACTOR")
                .value_parser(value_parser!(u8))
                .help("Mixer amplification factor"),
        )
        .arg(
            Arg::new("pan-separation")
                .long("pan-separation")
                .short('p')
                .value_name("PERCENT")
                .value_parser(value_parser!(u8).range(0..=100))
                .help("Stereo separation percentage"),
        )
        .arg(
            Arg::new("interpolation")
                .long("interpolation")
                .short('i')
                .value_name("MODE")
                .value_parser(["nearest", "linear", "spline"])
                .help("Resampling interpolation"),
        )
        .arg(
            Arg::new("no-filter")
                .long("no-filter")
                .action(ArgAction::SetTrue)
                .help("Disable the lowpass filter"),
        )
        .arg(
            Arg::new("watchdog-ms")
                .long("watchdog-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Stop the session if the decode loop stalls this long"),
        )
        .arg(
            Arg::new("null-output")
                .long("null-output")
                .action(ArgAction::SetTrue)
                .help("Decode without opening an audio device"),
        )
        .arg(
            Arg::new("no-input")
                .long("no-input")
                .action(ArgAction::SetTrue)
                .help("Run headless: no terminal UI and no key handling"),
        )
        .arg(
            Arg::new("json-events")
                .long("json-events")
                .action(ArgAction::SetTrue)
                .help("Print playback events to stdout as JSON lines"),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .subcommand(
                    Command::new("settings-json").about("Print the default settings as JSON"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_queue_and_flags() {
        let matches = build_cli()
            .try_get_matches_from(["modplay", "a.mod", "b.xm", "--start", "1", "--loop-list"])
            .unwrap();
        let files: Vec<&String> = matches.get_many::<String>("FILES").unwrap().collect();
        assert_eq!(files, ["a.mod", "b.xm"]);
        assert_eq!(matches.get_one::<usize>("start"), Some(&1));
        assert!(matches.get_flag("loop-list"));
        assert!(!matches.get_flag("shuffle"));
    }

    #[test]
    fn rejects_out_of_range_separation() {
        assert!(build_cli()
            .try_get_matches_from(["modplay", "a.mod", "--pan-separation", "150"])
            .is_err());
    }

    #[test]
    fn create_subcommand_needs_no_files() {
        let matches = build_cli()
            .try_get_matches_from(["modplay", "create", "settings-json"])
            .unwrap();
        assert!(matches.subcommand_matches("create").is_some());
    }
}

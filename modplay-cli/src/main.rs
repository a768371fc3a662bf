//! # modplay
//!
//! A command-line player for tracker modules and sampled audio.

use dotenv::dotenv;
use log::error;

mod cli;
mod controls;
mod logging;
mod runner;
mod ui;

fn main() {
    dotenv().ok();

    let args = cli::args::build_cli().get_matches();
    let headless = args.get_flag("no-input") || args.subcommand().is_some();
    let log_buffer = logging::init(headless);

    let code = match runner::run(&args, log_buffer) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err.to_string().to_lowercase());
            -1
        }
    };

    std::process::exit(code)
}

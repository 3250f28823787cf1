mod cgi;
mod config;
mod errors;
mod fs;
mod http;
mod mime;
mod net;
mod routing;
mod upload;
mod util;

use std::env;
use std::process;

use net::shutdown;

fn main() {
    env_logger::init();

    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "webserv".to_string());
    let config_path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: {program} <config-file>");
            process::exit(1);
        }
    };

    let parsed = match config::parse_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("configuration error: {e}");
            process::exit(1);
        }
    };

    let mut multiplexer = match net::Multiplexer::new(parsed) {
        Ok(mux) => mux,
        Err(e) => {
            log::error!("failed to bind listeners: {e}");
            process::exit(1);
        }
    };

    install_signal_handlers();

    log::info!("webserv ready, serving from {config_path}");
    if let Err(e) = multiplexer.run(&shutdown::SHUTDOWN) {
        log::error!("server error: {e}");
        process::exit(1);
    }

    log::info!("shutdown complete");
}

/// Installs the SIGINT/SIGTERM handlers that flip the process-wide shutdown
/// flag polled at the top of the multiplexer's loop.
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
    }
}

extern "C" fn handle_signal(_signum: libc::c_int) {
    shutdown::request_shutdown();
}

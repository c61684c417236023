use std::io::{IsTerminal, Read, Write};
use std::sync::Arc;

use clap::Parser;
use condra::config::{Args, TargetConfig};
use condra::shutdown::ShutdownSignal;

fn wrapped_main() -> anyhow::Result<()> {
    condra::logging::init();

    let config = TargetConfig::from_args(Args::parse())?;

    let shutdown = Arc::new(ShutdownSignal::new());
    let handler_signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || handler_signal.trigger())?;

    condra::run(&config, &shutdown)
}

fn main() {
    if let Err(err) = wrapped_main() {
        eprintln!("error: {:#}", err);

        // keep a double-clicked console window open long enough to read the error
        if std::io::stdin().is_terminal() {
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, "Press any key to continue...");
            let _ = stdout.flush();
            let _ = std::io::stdin().read(&mut [0u8]);
        }

        std::process::exit(1);
    }
}

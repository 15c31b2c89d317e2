use anyhow::Result;
use clap::Parser;
use verista::{paths_main, report_main, waves_main, CLIArguments};

fn main() -> Result<()> {
    let args = CLIArguments::parse();

    match args {
        CLIArguments::Report(args) => report_main(args),
        CLIArguments::Paths(args) => paths_main(args),
        CLIArguments::Waves(args) => waves_main(args),
    }
}

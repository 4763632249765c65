use anyhow::Result;

use mergepool::{app, cli};

fn main() -> Result<()> {
    let args = cli::parse();
    app::run(args)
}

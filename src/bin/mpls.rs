use anyhow::Result;

use mergepool::{app, cli};

fn main() -> Result<()> {
    let args = cli::parse_ls();
    app::run_ls(args)
}

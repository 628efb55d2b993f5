use anyhow::Result;
use waypoint::cli::{App, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();
    let app = App::from_args(&args)?;
    app.init_logging(args.verbose, args.no_color);

    app.run(args).await?;

    Ok(())
}

use clap::Args;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ConfigArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&options)?);
    } else {
        print!("{}", serde_yaml::to_string(&options)?);
    }
    Ok(())
}

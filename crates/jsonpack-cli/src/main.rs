use clap::{Parser, Subcommand};
use jsonpack_cli::{check, decode, encode, init_logging, load_config, load_schema, read_input, write_output};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jsonpack")]
#[command(version)]
#[command(about = "jsonpack - schema-driven binary encoding for JSON")]
struct Args {
    /// JSON file with codec settings
    #[arg(short, long, global = true, env = "JSONPACK_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a schema and print its canonical text
    Check {
        schema: PathBuf,

        #[arg(long)]
        pretty: bool,
    },
    /// Encode JSON into the binary format
    Encode {
        #[arg(short, long)]
        schema: PathBuf,

        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write hex text instead of raw bytes
        #[arg(long)]
        hex: bool,
    },
    /// Decode binary data into JSON
    Decode {
        #[arg(short, long)]
        schema: PathBuf,

        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Read hex text instead of raw bytes
        #[arg(long)]
        hex: bool,

        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Check { schema, pretty } => {
            let schema = load_schema(&schema, &config)?;
            println!("{}", check(&schema, pretty)?);
        }
        Command::Encode {
            schema,
            input,
            output,
            hex,
        } => {
            let schema = load_schema(&schema, &config)?;
            let data = read_input(input.as_deref())?;
            let bytes = encode(&schema, &data, hex)?;
            write_output(output.as_deref(), &bytes)?;
        }
        Command::Decode {
            schema,
            input,
            hex,
            pretty,
        } => {
            let schema = load_schema(&schema, &config)?;
            let data = read_input(input.as_deref())?;
            println!("{}", decode(&schema, &data, hex, pretty)?);
        }
    }

    Ok(())
}

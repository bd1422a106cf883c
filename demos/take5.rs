use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Error, ErrorKind, Read};
use std::path::{Path, PathBuf};
use take5::{
    PerfectHashBuilder, PerfectHashTable, StringEncoding, Take5DefaultHashLoader,
    Take5Dictionary, Take5Error, Take5HashConfig, Take5HashLoader, Take5Writer, ValueLayout,
    ValueTableBuilder, placement_hash,
};

/// Four native-order u32 words: format word, value size, value data, entry count.
const HEADER_SIZE: u32 = 16;

fn main() -> take5::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build(args) => run_build(args),
        Command::Lookup(args) => run_lookup(args),
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "take5 utility for building and probing value tables",
    subcommand_required = true,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assign perfect-hash indices to a JSON key-value file and write its value table
    Build(BuildArgs),
    /// Look up the value stored for a key
    Lookup(LookupArgs),
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Path to the source JSON object mapping keys to string values
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Path to the value table file to produce; the displacement table goes
    /// next to it with a `.phf` extension
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Seed of the key hash function
    #[arg(long, value_name = "SEED", default_value_t = 0)]
    hash_seed: u64,

    /// Seed of the first placement attempt
    #[arg(long, value_name = "SEED", default_value_t = 0)]
    seed: u64,

    /// Target number of keys per bucket
    #[arg(long, value_name = "KEYS", default_value_t = 4.0)]
    load_factor: f64,

    /// Store strings as UTF-16 units instead of UTF-8
    #[arg(long)]
    utf16: bool,
}

#[derive(clap::Args)]
struct LookupArgs {
    /// Path to a value table file produced by `build`
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Key to look up; keys outside the built set land on an arbitrary entry
    #[arg(short, long)]
    key: String,

    /// Seed of the key hash function used at build time
    #[arg(long, value_name = "SEED", default_value_t = 0)]
    hash_seed: u64,
}

fn run_build(args: BuildArgs) -> take5::Result<()> {
    let entries = load_entries_from_json(&args.input)?;
    let builder = PerfectHashBuilder::default()
        .with_hash_seed(args.hash_seed)
        .with_seed(args.seed)
        .with_load_factor(args.load_factor);
    let mut pairs = builder.pairs(entries)?;
    let (table, info) = builder.build(&mut pairs)?;
    print_json(&info)?;

    let encoding = if args.utf16 {
        StringEncoding::Utf16
    } else {
        StringEncoding::Utf8
    };
    let writer = File::create(&args.output)?;
    let table_info = ValueTableBuilder::default()
        .with_base_offset(HEADER_SIZE)
        .build_strings(&writer, &pairs, encoding, |v: &String| Some(v.as_str()))?;
    let layout = table_info.layout;
    let entry_count = u32::try_from(table_info.entry_count).map_err(|_| {
        Take5Error::Encode(format!(
            "{} entries do not fit the header's 32-bit count",
            table_info.entry_count
        ))
    })?;
    let header = [
        layout.format_word(),
        layout.value_size,
        layout.value_data,
        entry_count,
    ]
    .iter()
    .flat_map(|word| word.to_ne_bytes())
    .collect::<Vec<_>>();
    writer.write_all_at(&header, 0)?;
    print_json(&table_info)?;

    std::fs::write(args.output.with_extension("phf"), table.to_bytes()?)?;
    Ok(())
}

fn run_lookup(args: LookupArgs) -> take5::Result<()> {
    let mut data = Vec::new();
    File::open(&args.input)?.read_to_end(&mut data)?;
    let table = PerfectHashTable::from_slice(&std::fs::read(args.input.with_extension("phf"))?)?;

    let word = |i: usize| -> take5::Result<u32> {
        use take5::Take5Reader;
        data.u32_at(i * 4)
    };
    let layout = ValueLayout::from_raw(word(0)?, word(1)?, word(2)?)?;
    let dict = Take5Dictionary::new(data.as_slice(), layout);

    let config = Take5HashConfig::default().with_seed(args.hash_seed);
    let build_hasher = Take5DefaultHashLoader::load(&config)?;
    let Some(index) = table.slot_of(placement_hash(&build_hasher, &args.key)) else {
        println!("{}: <empty dictionary>", args.key);
        return Ok(());
    };

    let mut m = dict.new_match();
    m.populate(&dict, index, args.key.chars().count() as u32, 0);
    println!("{} {}: {:?}", m, args.key, m.string_value()?);
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> take5::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::other(format!("Failed to format JSON: {e}")))?;
    println!("{}", json);
    Ok(())
}

fn load_entries_from_json(path: &Path) -> take5::Result<Vec<(String, String)>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let value: Value = serde_json::from_reader(reader)
        .map_err(|e| invalid_json(format!("Failed to parse JSON input: {e}")))?;
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => Ok((key, s)),
                other => Err(Take5Error::from(invalid_json(format!(
                    "key {key:?} expects string value, found {other}"
                )))),
            })
            .collect(),
        other => Err(Take5Error::from(invalid_json(format!(
            "unsupported JSON top-level type: {other}"
        )))),
    }
}

fn invalid_json(message: String) -> Error {
    Error::new(ErrorKind::InvalidData, message)
}

use clap::Parser;
use std::path::PathBuf;

use ppe_inspector::config::{split_csv, CliOverrides};
use ppe_inspector::{
    GoogleTranslateTts, ImageInput, Inspector, InspectorConfig, Language, ReportWriter,
    SpeechSynthesizer,
};

#[derive(Parser)]
#[command(name = "ppe-inspector")]
#[command(about = "Check that every person in a photo wears the required protective equipment")]
struct Cli {
    /// Image file (jpg/png), http(s) URL, or "-" to read from stdin
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Config file (defaults to $PPE_INSPECTOR_CONFIG)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the HTML/JSON report
    #[arg(short, long, value_name = "DIR", default_value = "ppe-report")]
    output: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Save intermediate images of every step to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Message and speech language
    #[arg(long, value_name = "es|en")]
    lang: Option<Language>,

    /// Skip the spoken summary
    #[arg(long)]
    no_speech: bool,

    /// Comma-separated required equipment, overriding the config
    #[arg(long, value_name = "LABELS")]
    require: Option<String>,

    /// Print the JSON report instead of the text summary
    #[arg(long)]
    json: bool,

    /// Exit with status 2 unless everyone passes
    #[arg(long)]
    fail_on_missing: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let overrides = CliOverrides {
        language: args.lang,
        speech_enabled: args.no_speech.then_some(false),
        required: args.require.as_deref().map(split_csv),
    };
    let config = InspectorConfig::load(args.config.as_deref(), &overrides)?;

    let input = ImageInput::parse(&args.source);
    log::info!("Loading image: {}", input);
    let img = input.load()?;
    log::debug!("Image loaded: {}x{}", img.width(), img.height());

    let inspector = Inspector::from_config(&config)?.with_debug(args.debug_out);
    let inspection = inspector.inspect(img)?;

    let language = config.speech.language;
    let tts = GoogleTranslateTts::new();
    let speech: Option<&dyn SpeechSynthesizer> = if config.speech.enabled {
        Some(&tts)
    } else {
        None
    };
    let report = ReportWriter::new(language)
        .with_speech(speech)
        .write(&args.output, &inspection, &input.to_string())?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("\n=== {} ===", language.page_title());
        println!("{}", language.persons_detected(inspection.persons.len()));

        if inspection.persons.is_empty() {
            println!("{}", language.no_persons_message());
        }
        for person in &inspection.persons {
            println!("\n{}", language.person_heading(person.index));
            println!("  {}", language.detected_items(&person.detected_labels()));
            let mark = if person.verdict.passed { "✅" } else { "❌" };
            println!("  {} {}", mark, person.message(language));
        }
        println!("\nReport: {}", args.output.join(ppe_inspector::report::HTML_FILE).display());
    }

    if args.fail_on_missing && !inspection.all_passed() {
        std::process::exit(2);
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use diversity_ranker::analyzer::{AnalysisOutcome, DiversityAnalyzer};
use diversity_ranker::config::{Config, DataSourceMode, LevelMode};
use diversity_ranker::detail::InstitutionProfile;
use diversity_ranker::export;
use diversity_ranker::loader::DatasetLoader;
use diversity_ranker::ranking::RankedTable;
use diversity_ranker::{Dataset, Metric};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("diversity-ranker")
        .version("1.0")
        .about("Ranks institutions by demographic diversity metrics")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("metric")
                .short('m')
                .long("metric")
                .value_name("METRIC")
                .help("Diversity metric column or label, e.g. blaus_race"),
        )
        .arg(
            Arg::new("state")
                .short('s')
                .long("state")
                .value_name("CODE")
                .action(ArgAction::Append)
                .help("Restrict to a state (repeatable)"),
        )
        .arg(
            Arg::new("level")
                .short('l')
                .long("level")
                .value_name("LEVEL")
                .help("all, undergraduate, graduate, other, or a comma-separated list of levels"),
        )
        .arg(
            Arg::new("classification")
                .long("classification")
                .value_name("CODE")
                .action(ArgAction::Append)
                .help("Active classification code, e.g. HBCU (repeatable, replaces the config)"),
        )
        .arg(
            Arg::new("institution")
                .short('i')
                .long("institution")
                .value_name("NAME")
                .help("Show the detail profile of this institution"),
        )
        .arg(
            Arg::new("top")
                .short('n')
                .long("top")
                .value_name("N")
                .value_parser(clap::value_parser!(usize))
                .help("Number of rows to display (the export always has every row)"),
        )
        .arg(
            Arg::new("list-metrics")
                .long("list-metrics")
                .action(ArgAction::SetTrue)
                .help("List the metrics present in the dataset and exit"),
        )
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let mut config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("Failed to parse configuration {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!(
            "⚠️  Please review {} (data file, metric, filters), then run the program again.",
            config_file
        );
        return Ok(());
    };

    apply_overrides(&mut config, &matches)?;

    // The dataset is loaded once and only borrowed from here on
    let dataset = load_dataset(&config).await?;
    println!(
        "✅ Loaded {} records covering {} states from {}",
        dataset.len(),
        dataset.states().len(),
        dataset.source()
    );

    let analyzer = DiversityAnalyzer::new(&dataset);

    if matches.get_flag("list-metrics") {
        print_metrics(&analyzer);
        return Ok(());
    }

    let metric = select_metric(&analyzer, &config.metric)?;
    let criteria = config.criteria()?;
    print_selection(&config, metric);

    let outcome = analyzer.analyze(metric, &criteria);
    let (table, summary) = match &outcome {
        AnalysisOutcome::NoMatches => {
            println!("\n🔍 No institutions match the selected filters.");
            println!("   Try widening the state, level or classification selection.");
            return Ok(());
        }
        AnalysisOutcome::Ranked { table, summary } => (table, summary),
    };

    println!("\n🏆 Top Institutions by {}", metric.label());
    print_table(table, config.include_level_column, config.top_n);

    println!("\n📊 SUMMARY");
    println!("==========");
    println!("{}", summary);

    if let Some(name) = config.institution.as_deref() {
        match analyzer.profile(&outcome, name) {
            Ok(profile) => print_profile(&profile),
            Err(e) if !e.is_fatal() => {
                println!("\n❓ {}, choose another institution.", e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let output_dir = config.output_directory.as_deref().unwrap_or("output");
    let path = export::save_csv(table, config.include_level_column, Path::new(output_dir))
        .with_context(|| format!("Failed to export rankings to {}", output_dir))?;
    println!("\n💾 Rankings exported to: {}", path.display());

    Ok(())
}

fn apply_overrides(config: &mut Config, matches: &ArgMatches) -> Result<()> {
    if let Some(metric) = matches.get_one::<String>("metric") {
        config.metric = metric.clone();
    }
    if let Some(states) = matches.get_many::<String>("state") {
        config.states = states.cloned().collect();
    }
    if let Some(level) = matches.get_one::<String>("level") {
        // Anything that is not a mode name is a list of levels
        match level.parse::<LevelMode>() {
            Ok(mode) => config.level = mode,
            Err(_) => {
                config.level = LevelMode::Explicit;
                config.levels = Some(level.split(',').map(|l| l.trim().to_string()).collect());
            }
        }
    }
    if let Some(codes) = matches.get_many::<String>("classification") {
        config.classifications = Some(codes.cloned().collect());
    }
    if let Some(name) = matches.get_one::<String>("institution") {
        config.institution = Some(name.clone());
    }
    if let Some(top) = matches.get_one::<usize>("top") {
        config.top_n = Some(*top);
    }
    Ok(())
}

async fn load_dataset(config: &Config) -> Result<Dataset> {
    let loader = DatasetLoader::new();

    match config.data_source_mode {
        DataSourceMode::Local => {
            let file = config
                .data_file
                .as_deref()
                .unwrap_or("institutional_diversity_metric.csv");
            println!("📂 Reading dataset from: {}", file);
            loader
                .load_file(file)
                .with_context(|| format!("Failed to load dataset {}", file))
        }
        DataSourceMode::Internet => {
            let url = config
                .data_url
                .as_deref()
                .context("data_url must be set when data_source_mode = \"internet\"")?;
            println!("🌐 Fetching dataset from: {}", url);
            loader
                .load_url(url)
                .await
                .with_context(|| format!("Failed to load dataset from {}", url))
        }
    }
}

/// Fall back to a metric the data actually has when the requested one is missing
fn select_metric(analyzer: &DiversityAnalyzer, requested: &str) -> Result<Metric> {
    match analyzer.resolve_metric(requested) {
        Ok(metric) => Ok(metric),
        Err(e) if !e.is_fatal() => {
            let offered = analyzer.offered_metrics();
            let fallback = offered
                .first()
                .copied()
                .context("The dataset has no values for any diversity metric")?;
            println!("⚠️  {}, using {} instead", e, fallback.label());
            println!(
                "   Available metrics: {}",
                offered.iter().map(|m| m.column()).collect::<Vec<_>>().join(", ")
            );
            Ok(fallback)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_metrics(analyzer: &DiversityAnalyzer) {
    let offered = analyzer.offered_metrics();
    println!("\n📏 Diversity metrics:");
    for metric in Metric::ALL {
        let mark = if offered.contains(&metric) { "✅" } else { "➖" };
        println!("   {} {:<24} {}", mark, metric.column(), metric.label());
    }
}

fn print_selection(config: &Config, metric: Metric) {
    println!("🎯 Metric: {}", metric.label());
    if config.states.is_empty() {
        println!("🗺️  States: ALL STATES");
    } else {
        println!("🗺️  States: {}", config.states.join(", "));
    }
    match (&config.level, &config.levels) {
        (LevelMode::Explicit, Some(levels)) => println!("🎓 Levels: {}", levels.join(", ")),
        (mode, _) => println!("🎓 Level: {:?}", mode),
    }
    match &config.classifications {
        None => println!("🏛️  Classifications: ALL"),
        Some(codes) if codes.is_empty() => println!(
            "🏛️  Classifications: NONE ({:?})",
            config.empty_classification_policy
        ),
        Some(codes) => println!("🏛️  Classifications: {}", codes.join(", ")),
    }
}

/// Render the table from the same cells the CSV export writes
fn print_table(table: &RankedTable, include_level: bool, top_n: Option<usize>) {
    let headers = export::table_headers(include_level);
    let shown = top_n.unwrap_or(table.len()).min(table.len());
    let rows: Vec<Vec<String>> = table
        .rows()
        .iter()
        .take(shown)
        .map(|row| export::table_cells(row, include_level))
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(headers.iter().map(|h| h.to_string()).collect()));
    println!("{}", line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for cells in rows {
        println!("{}", line(cells));
    }

    if shown < table.len() {
        println!("   … {} more rows in the export", table.len() - shown);
    }
}

fn print_profile(profile: &InstitutionProfile) {
    println!("\n🏫 {} ({}, {})", profile.institution, profile.city, profile.state);
    println!("   Unit ID: {}  Level: {}", profile.unitid, profile.level);
    println!(
        "   Students: {} total ({} female, {} male)",
        profile.total_students, profile.female_students, profile.male_students
    );
    println!(
        "   % Female: {:.1}%  % Students of Color: {:.1}%",
        profile.percent_female, profile.percent_of_color
    );

    println!("   Gender proportions:");
    for (category, fraction) in &profile.gender_proportions {
        println!("      {:<20} {:.3}", category, fraction);
    }
    println!("   Race proportions:");
    for (category, fraction) in &profile.race_proportions {
        println!("      {:<20} {:.3}", category, fraction);
    }

    println!("   Diversity scores:");
    for score in &profile.scores {
        match score.value {
            Some(value) => println!("      {:<26} {:.3}", score.label, value),
            None => println!("      {:<26} N/A", score.label),
        }
    }

    if profile.classifications.is_empty() {
        println!("   Classifications: none");
    } else {
        println!("   Classifications:");
        for label in &profile.classifications {
            println!("      - {}", label);
        }
    }
}

// Chorgi MIDI Generator — CLI entry point.
//
// Generates a chord progression plus arp/melody/bass parts and writes the
// result to a Standard MIDI File.
//
// Usage:
//   cargo run -p chorgi_core --bin generate -- [output.mid] [--seed N]
//     [--key KEY] [--bars N] [--style STYLE] [--tempo BPM]
//     [--config FILE.json] [--randomize] [--no-arp] [--no-melody] [--no-bass]
//
// Keys: C, C#, D, ... B, plus minor as Am, C#m, ...
// Styles: "Smooth Random", "Pop (I-V-vi-IV)", "Pachelbel-ish",
//   "ii-V-I Focused", "Blues (12 Bar)"

use chorgi_core::config::Config;
use chorgi_core::error::ChorgiError;
use chorgi_core::generate::{
    generate_part, generate_progression, midi_options, progression_summary,
};
use chorgi_core::key::Key;
use chorgi_core::midi::write_midi_file;
use chorgi_core::progression::{ProgressionStyle, progression_beats};
use chorgi_core::timeline::{Part, Timeline};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Parse arguments
    let output_path = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("output.mid");
    let seed: u64 = parse_flag(&args, "--seed").unwrap_or_else(|| rand::rng().random());

    let mut config = match parse_flag::<String>(&args, "--config") {
        Some(path) => load_config(Path::new(&path)),
        None => Config::default(),
    };

    if has_flag(&args, "--randomize") {
        config.randomize(&mut StdRng::seed_from_u64(seed));
    }

    if let Some(key) = parse_flag::<String>(&args, "--key") {
        config.key = key.parse::<Key>().unwrap_or_else(|e| fail(&e));
    }
    if let Some(style) = parse_flag::<String>(&args, "--style") {
        config.progression_style = style
            .parse::<ProgressionStyle>()
            .unwrap_or_else(|e| fail(&e));
    }
    if let Some(bars) = parse_flag(&args, "--bars") {
        config.bars = bars;
    }
    if let Some(bpm) = parse_flag(&args, "--tempo") {
        config.bpm = bpm;
    }
    if has_flag(&args, "--no-arp") {
        config.include_arp = false;
    }
    if has_flag(&args, "--no-melody") {
        config.include_melody = false;
    }
    if has_flag(&args, "--no-bass") {
        config.include_bass = false;
    }

    println!("=== Chorgi MIDI Generator ===");
    println!("Output: {}", output_path);
    println!("Key: {}", config.key);
    println!(
        "Style: {} ({} bars, {})",
        config.progression_style, config.bars, config.chord_rate
    );
    println!("Tempo: {} BPM", config.bpm);
    println!("Seed: {}", seed);
    println!();

    // Generate the harmonic skeleton
    println!("[1/3] Generating progression...");
    let spans = match generate_progression(&config, seed) {
        Ok(spans) => spans,
        Err(e) => fail(&e),
    };
    println!("  {}", progression_summary(&spans));

    // Generate the included parts against the fixed progression
    println!("[2/3] Generating parts...");
    let mut timeline = Timeline::new(progression_beats(&spans));
    let includes = [
        (Part::Chord, config.include_chords),
        (Part::Arp, config.include_arp),
        (Part::Melody, config.include_melody),
        (Part::Bass, config.include_bass),
    ];
    for (part, include) in includes {
        if !include {
            println!("  {}: skipped", part.label());
            continue;
        }
        match generate_part(part, &config, &spans, seed) {
            Ok(events) => {
                println!("  {}: {} notes", part.label(), events.len());
                timeline.set_part(part, events);
            }
            Err(e) => fail(&e),
        }
    }

    // Write MIDI
    println!("[3/3] Writing MIDI to {}...", output_path);
    let options = midi_options(&config);
    match write_midi_file(&timeline, &options, Path::new(output_path)) {
        Ok(()) => {
            let duration_seconds = timeline.total_beats * 60.0 / config.bpm as f64;
            println!(
                "  Done! {} notes, {:.0}s at {} BPM",
                timeline.event_count(),
                duration_seconds,
                config.bpm
            );
        }
        Err(e) => fail(&e),
    }

    println!();
    println!("Play with: timidity {} (or any MIDI player)", output_path);
}

fn load_config(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error parsing {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn fail(err: &ChorgiError) -> ! {
    eprintln!("Error: {}", err);
    std::process::exit(1);
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

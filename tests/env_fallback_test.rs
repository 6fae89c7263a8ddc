use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use card_convert::{cli, commands::Step, mocks::RecordingRunner, Cli, RunOutcome};

const CONFIG: &str = r#"
locale: [enUS]
card_types:
  cardbacks:
    unity_folder: CardBacks
    frame_re: "_\\d+$"
    anim_folder: animated
    outputs: [original, webm]
    composite: bg.png
"#;

// Kept as a single test: it mutates process-wide environment variables.
#[test]
fn test_config_and_backgrounds_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    for file in [
        "input/CardBacks/enUS/Cardback_7.png",
        "input/CardBacks/enUS/animated/Cardback_7_0000.png",
        "assets/bg.png",
    ] {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"png").unwrap();
    }
    let config = root.join("settings/convert.yaml");
    fs::create_dir_all(config.parent().unwrap()).unwrap();
    fs::write(&config, CONFIG).unwrap();

    env::set_var("CARDCONVERT_CONFIG", &config);
    env::set_var("BACKGROUNDS_FOLDER", root.join("assets"));

    let input = root.join("input");
    let output = root.join("output");
    let cli = <Cli as clap::Parser>::try_parse_from([
        "card-convert",
        input.to_str().unwrap(),
        output.to_str().unwrap(),
    ])
    .unwrap();

    assert_eq!(cli.config, config);
    assert_eq!(cli.backgrounds, Some(root.join("assets")));

    let runner = RecordingRunner::new();
    let outcome = cli::run(&cli, &runner).unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("input unexpectedly missing");
    };
    assert_eq!(report.failures(), 0);

    let commands = runner.commands();
    let composite = commands
        .iter()
        .find(|c| c.step == Step::Composite)
        .unwrap();
    assert_eq!(PathBuf::from(&composite.args[0]), root.join("assets/bg.png"));
    assert!(output
        .join("cardbacks/enUS/animation/Cardback_7.webm")
        .exists());

    env::remove_var("CARDCONVERT_CONFIG");
    env::remove_var("BACKGROUNDS_FOLDER");
}

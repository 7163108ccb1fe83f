use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use gradebot::{
    config::{CanvasEnv, OpenAiEnv, RunConfig},
    confirm::ConfirmationMode,
};
use uuid::Uuid;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("gradebot-config-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp dir");
    root
}

#[test]
fn canvas_env_applies_defaults() {
    let env = CanvasEnv::from_lookup(lookup(&[
        ("CANVAS_API_KEY", "secret"),
        ("CANVAS_COURSE_ID", "13080964"),
    ]))
    .expect("canvas env");

    assert_eq!(env.api_url(), "https://canvas.instructure.com");
    assert_eq!(env.api_key(), "secret");
    assert_eq!(env.course_id(), 13080964);
    assert_eq!(env.timeout(), Duration::from_secs(30));
}

#[test]
fn canvas_env_trims_trailing_slash() {
    let env = CanvasEnv::from_lookup(lookup(&[
        ("CANVAS_API_KEY", "secret"),
        ("CANVAS_COURSE_ID", "7"),
        ("CANVAS_API_URL", "https://school.instructure.com/"),
        ("CANVAS_TIMEOUT_SECS", "5"),
    ]))
    .expect("canvas env");

    assert_eq!(env.api_url(), "https://school.instructure.com");
    assert_eq!(env.timeout(), Duration::from_secs(5));
}

#[test]
fn missing_canvas_key_is_fatal() {
    let err = CanvasEnv::from_lookup(lookup(&[("CANVAS_COURSE_ID", "7")])).unwrap_err();
    assert!(err.to_string().contains("CANVAS_API_KEY"));

    let err = CanvasEnv::from_lookup(lookup(&[
        ("CANVAS_API_KEY", "   "),
        ("CANVAS_COURSE_ID", "7"),
    ]))
    .unwrap_err();
    assert!(err.to_string().contains("CANVAS_API_KEY"));
}

#[test]
fn non_numeric_course_id_is_rejected() {
    let err = CanvasEnv::from_lookup(lookup(&[
        ("CANVAS_API_KEY", "secret"),
        ("CANVAS_COURSE_ID", "intro-101"),
    ]))
    .unwrap_err();
    assert!(err.to_string().contains("CANVAS_COURSE_ID"));
}

#[test]
fn openai_env_defaults_and_overrides() {
    let env = OpenAiEnv::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).expect("openai env");
    assert_eq!(env.api_base(), "https://api.openai.com/v1");
    assert_eq!(env.model(), "gpt-4o");
    assert_eq!(env.temperature(), 1.3);
    assert_eq!(env.max_tokens(), 8192);

    let env = OpenAiEnv::from_lookup(lookup(&[
        ("OPENAI_API_KEY", "sk-test"),
        ("OPENAI_BASE_URL", "https://api.deepseek.com/"),
        ("OPENAI_MODEL", "deepseek-chat"),
        ("OPENAI_TEMPERATURE", "not-a-number"),
        ("OPENAI_MAX_TOKENS", "1024"),
    ]))
    .expect("openai env");
    assert_eq!(env.api_base(), "https://api.deepseek.com");
    assert_eq!(env.model(), "deepseek-chat");
    assert_eq!(env.temperature(), 1.3);
    assert_eq!(env.max_tokens(), 1024);
}

#[test]
fn missing_openai_key_is_fatal() {
    let err = OpenAiEnv::from_lookup(lookup(&[])).unwrap_err();
    assert!(err.to_string().contains("OPENAI_API_KEY"));
}

#[test]
fn run_config_loads_files_and_dry_run_wins() {
    let root = temp_root();
    fs::write(root.join("prompt.txt"), "Grade strictly. Return JSON.").unwrap();
    fs::write(root.join("task.txt"), "1) Explain ownership (1 point)").unwrap();
    fs::write(root.join("students.csv"), "name\nAlice\n").unwrap();

    let config = RunConfig::load(
        &root.join("prompt.txt"),
        &root.join("task.txt"),
        42,
        Some(&root.join("students.csv")),
        ConfirmationMode::Full,
        true,
    )
    .expect("run config");

    assert_eq!(config.prompt(), "Grade strictly. Return JSON.");
    assert_eq!(config.rubric(), "1) Explain ownership (1 point)");
    assert_eq!(config.assignment_id(), 42);
    assert_eq!(config.mode(), ConfirmationMode::DryRun);
    assert_eq!(config.roster().map(|r| r.entries().len()), Some(1));

    fs::remove_dir_all(root).ok();
}

#[test]
fn empty_rubric_is_rejected() {
    let root = temp_root();
    fs::write(root.join("prompt.txt"), "Grade.").unwrap();
    fs::write(root.join("task.txt"), "  \n").unwrap();

    let err = RunConfig::load(
        &root.join("prompt.txt"),
        &root.join("task.txt"),
        1,
        None,
        ConfirmationMode::Prompt,
        false,
    )
    .unwrap_err();
    assert!(err.to_string().contains("rubric"));

    fs::remove_dir_all(root).ok();
}

#[test]
fn roster_without_students_is_rejected() {
    let root = temp_root();
    fs::write(root.join("prompt.txt"), "Grade.").unwrap();
    fs::write(root.join("task.txt"), "1) Explain lifetimes (1 point)").unwrap();
    fs::write(root.join("students.csv"), "name\n\n").unwrap();

    let err = RunConfig::load(
        &root.join("prompt.txt"),
        &root.join("task.txt"),
        1,
        Some(&root.join("students.csv")),
        ConfirmationMode::Full,
        false,
    )
    .unwrap_err();
    assert!(err.to_string().contains("lists no students"));

    fs::remove_dir_all(root).ok();
}

#[test]
fn confirmation_modes_parse() {
    assert_eq!("full".parse::<ConfirmationMode>(), Ok(ConfirmationMode::Full));
    assert_eq!("Prompt".parse::<ConfirmationMode>(), Ok(ConfirmationMode::Prompt));
    assert_eq!("dry-run".parse::<ConfirmationMode>(), Ok(ConfirmationMode::DryRun));
    assert!("auto".parse::<ConfirmationMode>().is_err());
    assert_eq!(ConfirmationMode::DryRun.to_string(), "dry-run");
}

/*!
 * Integration tests for the dirprompt binary
 */

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn run_dirprompt(settings: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dirprompt"))
        .arg("--settings")
        .arg(settings)
        .arg("--quiet")
        .args(args)
        .output()
        .expect("Failed to run dirprompt")
}

#[test]
fn test_report_is_written() {
    let temp_dir = tempdir().unwrap();
    let project = temp_dir.path().join("proj");
    let out = temp_dir.path().join("out");
    fs::create_dir_all(project.join(".git")).unwrap();
    fs::write(project.join("app.py"), "x=1").unwrap();
    let settings = temp_dir.path().join("config.json");

    let output = run_dirprompt(
        &settings,
        &[
            project.to_str().unwrap(),
            out.to_str().unwrap(),
            "--context",
            "ctx",
            "--objective",
            "obj",
        ],
    );
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let written: Vec<_> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(written.len(), 1);
    let name = written[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("proj_") && name.ends_with(".md"), "{}", name);
    // proj_ + 14 timestamp digits + .md
    assert_eq!(name.len(), "proj_".len() + 14 + ".md".len());

    let text = fs::read_to_string(&written[0]).unwrap();
    assert!(text.starts_with("Contexto: ctx\n\nObjetivo: obj\n\n"));
    assert!(text.contains("**app.py**"));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[OK]"));

    // The folders of the run are remembered
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&settings).unwrap()).unwrap();
    assert_eq!(
        saved["ultima_carpeta_codigo"],
        serde_json::json!(project.to_string_lossy())
    );
}

#[test]
fn test_txt_output_extension() {
    let temp_dir = tempdir().unwrap();
    let project = temp_dir.path().join("proj");
    let out = temp_dir.path().join("out");
    fs::create_dir_all(&project).unwrap();
    let settings = temp_dir.path().join("config.json");

    let output = run_dirprompt(
        &settings,
        &[project.to_str().unwrap(), out.to_str().unwrap(), "--txt"],
    );
    assert_eq!(output.status.code(), Some(0));

    let entry = fs::read_dir(&out).unwrap().next().unwrap().unwrap();
    assert!(entry.file_name().to_string_lossy().ends_with(".txt"));
}

#[test]
fn test_missing_source_exits_with_one() {
    let temp_dir = tempdir().unwrap();
    let not_a_dir = temp_dir.path().join("file.py");
    fs::write(&not_a_dir, "x").unwrap();
    let out = temp_dir.path().join("out");
    let settings = temp_dir.path().join("config.json");

    let output = run_dirprompt(
        &settings,
        &[not_a_dir.to_str().unwrap(), out.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[ERROR]"));
    assert!(!out.exists());
}

#[test]
fn test_incomplete_mysql_credentials_exit_with_one() {
    let temp_dir = tempdir().unwrap();
    let project = temp_dir.path().join("proj");
    fs::create_dir_all(&project).unwrap();
    let settings = temp_dir.path().join("config.json");

    let output = run_dirprompt(
        &settings,
        &[
            project.to_str().unwrap(),
            temp_dir.path().join("out").to_str().unwrap(),
            "--mysql-host",
            "localhost",
            "--mysql-user",
            "root",
            "--mysql-password",
            "",
            "--mysql-database",
            "shop",
        ],
    );

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_unwritable_destination_exits_with_two() {
    let temp_dir = tempdir().unwrap();
    let project = temp_dir.path().join("proj");
    fs::create_dir_all(&project).unwrap();
    // A file where the destination folder should be
    let blocked = temp_dir.path().join("blocked");
    fs::write(&blocked, "").unwrap();
    let settings = temp_dir.path().join("config.json");

    let output = run_dirprompt(
        &settings,
        &[project.to_str().unwrap(), blocked.join("out").to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_batch_mode() {
    let temp_dir = tempdir().unwrap();
    let container = temp_dir.path().join("projects");
    for name in ["jocarsa-one", "jocarsa-two", "misc"] {
        fs::create_dir_all(container.join(name)).unwrap();
        fs::write(container.join(name).join("index.php"), "<?php echo 1;").unwrap();
    }
    let out = temp_dir.path().join("prompts");
    let settings = temp_dir.path().join("config.json");

    let output = run_dirprompt(
        &settings,
        &[
            container.to_str().unwrap(),
            out.to_str().unwrap(),
            "--batch",
        ],
    );

    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    assert!(out.join("jocarsa-one.txt").is_file());
    assert!(out.join("jocarsa-two.txt").is_file());
    assert!(!out.join("misc.txt").exists());
}

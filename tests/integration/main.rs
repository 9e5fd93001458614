//! Integration tests for tpo

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const UNO_INI: &str = "; comment\n[env:uno]\nplatform = atmelavr   ; avr\nboard = uno\n";
    const UNO_FINGERPRINT: &str = "65e19c7d";

    fn tpo() -> Command {
        cargo_bin_cmd!("tpo")
    }

    /// A project with a platformio.ini and a config pointing the global
    /// cache into the same temp dir
    struct Sandbox {
        temp: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let project = temp.path().join("project");
            fs::create_dir_all(&project).unwrap();
            fs::write(project.join("platformio.ini"), UNO_INI).unwrap();

            let global = temp.path().join("global");
            let config = format!("[global]\nroot = {:?}\n", global.display().to_string());
            fs::write(temp.path().join("config.toml"), config).unwrap();

            Self { temp }
        }

        fn project(&self) -> PathBuf {
            self.temp.path().join("project")
        }

        fn global(&self) -> PathBuf {
            self.temp.path().join("global")
        }

        fn config(&self) -> PathBuf {
            self.temp.path().join("config.toml")
        }

        fn cmd(&self) -> Command {
            let mut cmd = tpo();
            cmd.arg("-c").arg(self.config()).arg("-C").arg(self.project());
            cmd
        }
    }

    fn entry_dir(project: &Path) -> PathBuf {
        project.join(".tpo").join(format!("uno-{UNO_FINGERPRINT}"))
    }

    #[test]
    fn help_displays() {
        tpo()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Two-tier build cache"));
    }

    #[test]
    fn version_displays() {
        tpo()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("tpo"));
    }

    #[test]
    fn fingerprint_ignores_comments() {
        let sandbox = Sandbox::new();
        fs::write(
            sandbox.project().join("plain.ini"),
            "[env:uno]\nplatform = atmelavr\nboard = uno",
        )
        .unwrap();

        for file in ["platformio.ini", "plain.ini"] {
            sandbox
                .cmd()
                .args(["fingerprint", file])
                .assert()
                .success()
                .stdout(format!("{UNO_FINGERPRINT}\n"));
        }
    }

    #[test]
    fn fingerprint_changes_with_dependencies() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["fingerprint", "platformio.ini", "--dep", "FastLED"])
            .assert()
            .success()
            .stdout(predicate::str::contains(UNO_FINGERPRINT).not());
    }

    #[test]
    fn fingerprint_missing_file() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["fingerprint", "missing.ini"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn entry_miss_then_hit() {
        let sandbox = Sandbox::new();
        let expected = entry_dir(&sandbox.project());

        sandbox
            .cmd()
            .args(["entry", "uno", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"hit\": false"));

        assert!(expected.is_dir());
        assert!(expected.join(".cache_metadata.json").is_file());

        sandbox
            .cmd()
            .args(["entry", "uno", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"hit\": true"));
    }

    #[test]
    fn entry_plain_prints_directory() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["entry", "uno", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("uno-{UNO_FINGERPRINT}")));
    }

    #[test]
    fn entry_rejects_unsafe_platform() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["entry", "bad|name"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid platform"));
    }

    #[test]
    fn cache_list_empty_json() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("[]"));
    }

    #[test]
    fn cache_list_shows_entries() {
        let sandbox = Sandbox::new();
        sandbox.cmd().args(["entry", "uno"]).assert().success();

        sandbox
            .cmd()
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(format!("uno-{UNO_FINGERPRINT}\n"));
    }

    #[test]
    fn cache_clear_removes_root() {
        let sandbox = Sandbox::new();
        sandbox.cmd().args(["entry", "uno"]).assert().success();

        sandbox
            .cmd()
            .args(["cache", "clear", "--yes"])
            .assert()
            .success();
        assert!(!sandbox.project().join(".tpo").exists());
    }

    #[test]
    fn cache_clear_without_yes_aborts() {
        let sandbox = Sandbox::new();
        sandbox.cmd().args(["entry", "uno"]).assert().success();

        sandbox
            .cmd()
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Aborted"));
        assert!(entry_dir(&sandbox.project()).is_dir());
    }

    #[test]
    fn cache_migrate_removes_legacy_dirs() {
        let sandbox = Sandbox::new();
        let project = sandbox.project();
        fs::create_dir_all(project.join(".tpo/old-layout")).unwrap();
        fs::create_dir_all(project.join(".tpo_fast_cache")).unwrap();

        sandbox.cmd().args(["cache", "migrate"]).assert().success();

        assert!(!project.join(".tpo/old-layout").exists());
        assert!(!project.join(".tpo_fast_cache").exists());
    }

    #[test]
    fn config_path_uses_flag() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_init_and_show() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        tpo()
            .arg("-c")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(path.is_file());

        tpo()
            .arg("-c")
            .arg(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[local]"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[local\n").unwrap();

        tpo()
            .arg("-c")
            .arg(&path)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn global_size_of_missing_root() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["global", "size"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Size"));
    }

    #[test]
    fn global_purge_removes_root() {
        let sandbox = Sandbox::new();
        let repo = sandbox.global().join("github.com/fastled/fastled");
        fs::create_dir_all(repo.join("main-0123abcd_dir")).unwrap();
        fs::write(repo.join("main-0123abcd_dir/library.json"), "{}").unwrap();
        fs::write(repo.join("main-0123abcd_dir.done"), "completed").unwrap();

        sandbox
            .cmd()
            .args(["global", "purge", "--yes"])
            .assert()
            .success();
        assert!(!sandbox.global().exists());
    }

    #[test]
    fn global_list_shows_complete_artifacts() {
        let sandbox = Sandbox::new();
        let repo = sandbox.global().join("github.com/fastled/fastled");
        fs::create_dir_all(repo.join("main-0123abcd_dir")).unwrap();
        fs::write(repo.join("main-0123abcd_dir.done"), "completed").unwrap();
        fs::create_dir_all(repo.join("master-89abcdef_dir")).unwrap();

        sandbox
            .cmd()
            .args(["global", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("main-0123abcd_dir"))
            .stdout(predicate::str::contains("master-89abcdef_dir").not());
    }

    #[test]
    fn global_fetch_rejects_bad_url() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["global", "fetch", "ftp://example.com/a/b"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid source repository URL"));
    }

    #[test]
    fn purge_both_tiers() {
        let sandbox = Sandbox::new();
        sandbox.cmd().args(["entry", "uno"]).assert().success();
        fs::create_dir_all(sandbox.global().join("github.com/a/b")).unwrap();

        sandbox.cmd().args(["purge", "--yes"]).assert().success();

        assert!(!sandbox.project().join(".tpo").exists());
        assert!(!sandbox.global().exists());
    }

    #[test]
    fn deps_resolve_known_and_guessed() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["deps", "resolve", "FastLED", "Servo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("https://github.com/fastled/fastled"))
            .stdout(predicate::str::contains(
                "https://github.com/arduino-libraries/Servo",
            ))
            .stdout(predicate::str::contains("guessed"));
    }

    #[test]
    fn deps_resolve_uses_config_overrides() {
        let sandbox = Sandbox::new();
        let mut config = fs::read_to_string(sandbox.config()).unwrap();
        config.push_str("\n[deps.libraries]\nmylib = \"me/mylib\"\n");
        fs::write(sandbox.config(), config).unwrap();

        sandbox
            .cmd()
            .args(["deps", "resolve", "MyLib"])
            .assert()
            .success()
            .stdout(predicate::str::contains("https://github.com/me/mylib"));
    }

    #[test]
    fn completions_generate() {
        tpo()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("tpo"));
    }
}

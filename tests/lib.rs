#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn main_cmd() -> Command {
        Command::cargo_bin("main").unwrap()
    }

    fn db_path(dir: &TempDir) -> String {
        dir.path().join("reviews.db").to_str().unwrap().to_string()
    }

    fn cmd_success(dir: &TempDir, cmd: &str, args: Vec<&str>) {
        let mut main_cmd = main_cmd();
        main_cmd
            .arg(db_path(dir))
            .arg(cmd)
            .args(args)
            .assert()
            .success();
    }

    fn cmd_should_print(dir: &TempDir, cmd: &str, args: Vec<&str>, expected: &str) {
        let expected = expected.to_string();
        main_cmd()
            .arg(db_path(dir))
            .arg(cmd)
            .args(args)
            .assert()
            .success()
            .stdout(predicate::function(move |output: &str| {
                output.contains(&expected)
            }));
    }

    #[test]
    fn offline_save_and_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        cmd_should_print(
            &dir,
            "save",
            vec!["--type", "Fleur", "--name", "Amnesia Haze", "--farm", "Vallée Verte"],
            "Review saved (id: 1)!",
        );
        cmd_should_print(&dir, "list", vec![], "Amnesia Haze");
        // Offline there is no ownership, the public view serves the same records.
        cmd_should_print(&dir, "list", vec!["--public"], "Amnesia Haze");
    }

    #[test]
    fn show_prints_the_stored_record_as_json() {
        let dir = tempfile::tempdir().unwrap();

        cmd_success(
            &dir,
            "save",
            vec!["--type", "Hash", "--cultivars", "Critical Kush"],
        );
        cmd_should_print(&dir, "show", vec!["1"], "\"Critical Kush\"");
        cmd_should_print(&dir, "show", vec!["1"], "correlationKey");
    }

    #[test]
    fn delete_removes_the_record_locally() {
        let dir = tempfile::tempdir().unwrap();

        cmd_success(&dir, "save", vec!["--type", "Fleur", "--name", "Zkittlez"]);
        cmd_should_print(&dir, "delete", vec!["1"], "Review 1 deleted.");
        cmd_should_print(&dir, "list", vec![], "No reviews stored.");
        cmd_should_print(&dir, "delete", vec!["1"], "No review with id 1.");
    }

    #[test]
    fn repeated_draft_saves_update_in_place() {
        let dir = tempfile::tempdir().unwrap();

        cmd_should_print(
            &dir,
            "save",
            vec!["--type", "Fleur", "--name", "Gelato", "--draft"],
            "Review saved (id: 1)!",
        );
        // The second autosave of the same content adopts the stored draft.
        cmd_should_print(
            &dir,
            "save",
            vec!["--type", "Fleur", "--name", "Gelato", "--draft"],
            "Review saved (id: 1)!",
        );
        // The final save converts the draft instead of adding a sibling.
        cmd_should_print(
            &dir,
            "save",
            vec!["--type", "Fleur", "--name", "Gelato", "--breeder", "Sherbinskis"],
            "Review saved (id: 1)!",
        );

        main_cmd()
            .arg(db_path(&dir))
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::function(|output: &str| {
                output.matches("Gelato").count() == 1 && !output.contains("(draft)")
            }));
    }

    #[test]
    fn dedupe_only_removes_with_the_apply_flag() {
        let dir = tempfile::tempdir().unwrap();

        // Two final saves of the same identity create true duplicates.
        cmd_success(&dir, "save", vec!["--type", "Fleur", "--name", "Amnesia"]);
        cmd_success(&dir, "save", vec!["--type", "Fleur", "--name", "Amnesia"]);

        cmd_should_print(&dir, "dedupe", vec![], "Would remove 1 duplicate review(s).");
        // Reporting must not have removed anything.
        main_cmd()
            .arg(db_path(&dir))
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::function(|output: &str| {
                output.matches("Amnesia").count() == 2
            }));

        cmd_should_print(&dir, "dedupe", vec!["--apply"], "Removed 1 duplicate review(s).");
        main_cmd()
            .arg(db_path(&dir))
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::function(|output: &str| {
                output.matches("Amnesia").count() == 1
            }));
    }

    #[test]
    fn privacy_toggle_without_remote_reports_inactive() {
        let dir = tempfile::tempdir().unwrap();

        cmd_success(&dir, "save", vec!["--type", "Fleur", "--name", "Secret"]);
        cmd_should_print(
            &dir,
            "privacy",
            vec!["1", "--private"],
            "No remote service active, visibility unchanged.",
        );
    }
}

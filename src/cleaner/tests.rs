use super::*;
use serde_json::json;
use tempfile::TempDir;

fn contains_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key(key) || map.values().any(|child| contains_key(child, key))
        }
        Value::Array(items) => items.iter().any(|item| contains_key(item, key)),
        _ => false,
    }
}

fn sample_tree() -> Value {
    json!({
        "slug": "top",
        "teams": {
            "home": {
                "name": "Grêmio",
                "slug": "gremio",
                "country": {"alpha2": "BR", "alpha3": "BRA", "name": "Brazil"},
                "fieldTranslations": {"nameTranslation": {"ar": "غريميو"}}
            }
        },
        "players": [
            {"player": {"name": "A", "slug": "a", "shortNameTranslation": {}}},
            [{"slug": "nested"}, 1, "slug", null]
        ]
    })
}

#[test]
fn removes_single_key() {
    let cleaner = TreeCleaner::new(["slug"]);
    let cleaned = cleaner.clean(json!({"teams": {"home": {"slug": "abc", "name": "X"}}}));
    assert_eq!(cleaned, json!({"teams": {"home": {"name": "X"}}}));
}

#[test]
fn default_keys_removed_at_any_depth() {
    let cleaner = TreeCleaner::default();
    let cleaned = cleaner.clean(sample_tree());

    for key in DEFAULT_REMOVED_KEYS {
        assert!(!contains_key(&cleaned, key), "{key} survived cleaning");
    }
    assert_eq!(cleaned["teams"]["home"]["country"], json!({"name": "Brazil"}));
    assert_eq!(cleaned["players"][1], json!([{}, 1, "slug", null]));
}

#[test]
fn cleaning_is_idempotent() {
    let cleaner = TreeCleaner::default();
    let once = cleaner.clean(sample_tree());
    let twice = cleaner.clean(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn empty_key_set_is_identity() {
    let cleaner = TreeCleaner::new(Vec::<String>::new());
    assert_eq!(cleaner.clean(sample_tree()), sample_tree());
}

#[test]
fn scalars_are_untouched() {
    let cleaner = TreeCleaner::default();
    assert_eq!(cleaner.clean(json!("slug")), json!("slug"));
    assert_eq!(cleaner.clean(json!(3.5)), json!(3.5));
    assert_eq!(cleaner.clean(Value::Null), Value::Null);
}

#[test]
fn token_counting() {
    assert_eq!(count_tokens(""), 0);
    assert_eq!(count_tokens("{\n  \"a\": 1,\n  \"b\": 2\n}"), 6);
}

#[test]
fn process_directory_mirrors_layout() {
    let base = TempDir::new().expect("should create base dir");
    let output = TempDir::new().expect("should create output dir");

    let round_dir = base.path().join("season_2024/rounds/r01");
    fs::create_dir_all(&round_dir).expect("should create round dir");
    fs::write(
        round_dir.join("match.json"),
        serde_json::to_string_pretty(&sample_tree()).expect("should serialize"),
    )
    .expect("should write match");
    fs::write(round_dir.join("broken.json"), "{ not json").expect("should write broken file");
    fs::write(round_dir.join("notes.txt"), "ignored").expect("should write text file");

    let cleaner = TreeCleaner::default();
    let report = cleaner.process_directory(
        base.path(),
        output.path(),
        &["season_2024", "season_1999"],
    );

    assert_eq!(report.cleaned.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.missing_seasons, vec!["season_1999".to_string()]);
    assert!(report.tokens_after() < report.tokens_before());

    let cleaned_path = output.path().join("season_2024/rounds/r01/match.json");
    let content = fs::read_to_string(&cleaned_path).expect("should read cleaned file");
    let cleaned: Value = serde_json::from_str(&content).expect("should parse cleaned file");
    assert!(!contains_key(&cleaned, "slug"));

    // originals are left alone
    let original = fs::read_to_string(round_dir.join("match.json")).expect("should read original");
    assert!(original.contains("gremio"));
    assert!(!output.path().join("season_2024/rounds/r01/notes.txt").exists());
}

#[test]
fn json_files_are_sorted_and_filtered() {
    let dir = TempDir::new().expect("should create dir");
    fs::create_dir_all(dir.path().join("b")).expect("should create subdir");
    fs::write(dir.path().join("b/2.json"), "{}").expect("should write");
    fs::write(dir.path().join("1.JSON"), "{}").expect("should write");
    fs::write(dir.path().join("x.md"), "").expect("should write");

    let files = json_files(dir.path());
    assert_eq!(
        files,
        vec![dir.path().join("1.JSON"), dir.path().join("b/2.json")]
    );
}

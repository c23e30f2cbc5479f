use clap::Parser;
use cli::args::Cli;
use cli::commands::{self, parse_range, render_text};
use serde_json::json;
use std::fs;
use std::path::Path;

fn setup() -> tempfile::TempDir {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("config.json"), r#"{"MEDIA_PATH": "media"}"#).unwrap();
    fs::create_dir_all(temp.path().join("media/trip")).unwrap();
    fs::write(temp.path().join("media/trip/a.jpg"), b"x").unwrap();
    fs::write(temp.path().join("media/trip/b.mp4"), b"x").unwrap();
    temp
}

fn gallery(root: &Path, args: &[&str]) -> serde_json::Value {
    let mut argv = vec!["gallery", "--root", root.to_str().unwrap()];
    argv.extend_from_slice(args);
    commands::run(Cli::try_parse_from(argv).unwrap()).unwrap()
}

#[test]
fn browse_and_tag_through_cli() {
    let temp = setup();
    let root = temp.path();

    let page = gallery(root, &["browse", "trip"]);
    assert_eq!(page["media"][0]["url"], "/static/trip/a.jpg");
    assert_eq!(page["media"][1]["name"], "b.mp4");

    let tagged = gallery(root, &["tag", "--tags", "sea,sun", "/static/trip/a.jpg"]);
    assert_eq!(tagged["changed"], true);

    let found = gallery(root, &["filter", "--op", "and", "--tags", "sea,sun"]);
    assert_eq!(found[0]["name"], "a.jpg");
    assert_eq!(found[0]["tags"], json!(["sea", "sun"]));

    let states = gallery(root, &["tags-of", "a.jpg"]);
    assert!(states
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["name"] == "sea" && s["tagged"] == true));
}

#[test]
fn rename_delete_and_clips_persist_between_runs() {
    let temp = setup();
    let root = temp.path();

    gallery(root, &["clips", "set", "/static/trip/b.mp4", "1-2.5", "4-6"]);
    let renamed = gallery(root, &["rename", "/static/trip/b.mp4", "c"]);
    assert_eq!(renamed["url"], "/static/trip/c.mp4");

    let clips = gallery(root, &["clips", "get", "/static/trip/c.mp4"]);
    assert_eq!(clips.as_array().unwrap().len(), 2);
    assert_eq!(clips[1]["stop"], 6.0);

    let deleted = gallery(root, &["delete", "/static/trip/c.mp4"]);
    assert_eq!(deleted["outcome"]["kind"], "trashed");
    assert!(root.join("media/deleted/c.mp4").is_file());

    let listed = gallery(root, &["clips", "list"]);
    assert!(listed.get("/static/deleted/c.mp4").is_some());
}

#[test]
fn batch_commands_report_failures() {
    let temp = setup();
    let root = temp.path();
    let report = gallery(root, &["move", "--to", "archive", "/static/trip/a.jpg", "/elsewhere/x.jpg"]);
    assert_eq!(report["success"], false);
    assert!(root.join("media/archive/a.jpg").is_file());

    let report = gallery(root, &["delete-multiple", "--tags", "best"]);
    assert_eq!(report["success"], true);
    assert_eq!(gallery(root, &["tags"]), json!([]));
}

#[test]
fn unknown_media_is_an_error() {
    let temp = setup();
    let cli = Cli::try_parse_from(["gallery", "--root", temp.path().to_str().unwrap(), "rename", "/static/none.jpg", "x"])
        .unwrap();
    assert!(commands::run(cli).is_err());
}

#[test]
fn clip_ranges_parse_and_validate() {
    let clip = parse_range("1.5-3").unwrap();
    assert_eq!((clip.start, clip.stop), (1.5, 3.0));
    assert!(parse_range("3").is_err());
    assert!(parse_range("5-2").is_err());
}

#[test]
fn text_output_lists_urls() {
    let value = json!([{ "url": "/static/a.jpg", "name": "a.jpg" }, { "name": "tag" }, "plain"]);
    assert_eq!(render_text(&value).unwrap(), "/static/a.jpg\ntag\nplain");
}

use charmstore_client::content_hash::sha384_hex;
use mockito::{Matcher, Server};
use serde_json::json;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn cli_binary() -> PathBuf {
    option_env!("CARGO_BIN_EXE_charm")
        .map(PathBuf::from)
        .unwrap_or_else(|| env::current_dir().unwrap().join("target/debug/charm"))
}

fn networking_available() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn run_charm(home: &Path, store_url: &str, args: &[&str]) -> Output {
    Command::new(cli_binary())
        .args(args)
        .current_dir(home)
        .env("HOME", home)
        .env("JUJU_CHARMSTORE", store_url)
        .env("CHARM_TEST_MODE", "1")
        .env_remove("CHARM_AUTH")
        .env_remove("CHARM_UPLOAD_CACHE")
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(cli_binary())
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("attach"));
    assert!(stdout.contains("list-resources"));
}

#[test]
fn test_version() {
    let output = Command::new(cli_binary())
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_attach_rejects_malformed_resource_argument() {
    let temp_dir = TempDir::new().unwrap();
    let output = run_charm(
        temp_dir.path(),
        "http://127.0.0.1:9",
        &["attach", "cs:wordpress", "website"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Expected format 'name=value'"));
}

#[tokio::test]
async fn test_list_resources_json() {
    if !networking_available() {
        eprintln!("skipping test_list_resources_json: networking disabled in sandbox");
        return;
    }
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/wordpress/meta/resources")
        .with_status(200)
        .with_body(json!([{"Name": "website", "Type": "file", "Path": "site.tgz"}]).to_string())
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let output = run_charm(
        temp_dir.path(),
        &server.url(),
        &["list-resources", "wordpress", "--format", "json"],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed[0]["Name"], "website");
    assert_eq!(listed[0]["Type"], "file");
}

#[tokio::test]
async fn test_attach_unknown_resource() {
    if !networking_available() {
        eprintln!("skipping test_attach_unknown_resource: networking disabled in sandbox");
        return;
    }
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/wordpress/meta/resources")
        .with_status(200)
        .with_body(json!([{"Name": "website", "Type": "file"}]).to_string())
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let output = run_charm(
        temp_dir.path(),
        &server.url(),
        &["attach", "wordpress", "database=dump.sql"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no such resource \"database\""));
}

#[tokio::test]
async fn test_attach_file_uploads_and_clears_cache() {
    if !networking_available() {
        eprintln!("skipping test_attach_file_uploads_and_clears_cache: networking disabled in sandbox");
        return;
    }
    let content = b"static site bytes";
    let mut server = Server::new_async().await;
    let _meta = server
        .mock("GET", "/wordpress/meta/resources")
        .with_status(200)
        .with_body(json!([{"Name": "website", "Type": "file"}]).to_string())
        .create_async()
        .await;
    let _new = server
        .mock("POST", "/upload")
        .with_status(200)
        .with_body(
            json!({"UploadId": "u1", "MinPartSize": 1024, "MaxPartSize": 4096, "MaxParts": 10})
                .to_string(),
        )
        .create_async()
        .await;
    let part = server
        .mock("PUT", "/upload/u1/0")
        .match_query(Matcher::UrlEncoded("hash".into(), sha384_hex(content)))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let _finish = server
        .mock("PUT", "/upload/u1")
        .with_status(200)
        .with_body(json!({"Hash": sha384_hex(content)}).to_string())
        .create_async()
        .await;
    let _add = server
        .mock("POST", "/wordpress/resource/website")
        .match_query(Matcher::UrlEncoded("filename".into(), "site.tgz".into()))
        .with_status(200)
        .with_body(r#"{"Revision": 3}"#)
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("site.tgz"), content).unwrap();

    let output = run_charm(
        temp_dir.path(),
        &server.url(),
        &["attach", "wordpress", "website=site.tgz", "-q"],
    );

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("uploaded revision 3 of website"));
    part.assert_async().await;

    let cache: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp_dir.path().join(".charm/upload-id-cache.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(cache["entries"], json!([]));
}

//! Shared helpers for the CLI integration tests: a mock npm registry and
//! project fixtures.
//!
//! Registry contents:
//! - `a`: 1.0.0, 1.1.0 (latest); 1.1.0 depends on `b@^2.0.0` and has
//!   `devDependencies` on `dev-only@^1.0.0`
//! - `b`: 2.0.0, depends on `c@^3.0.0`
//! - `c`: 3.0.0
//! - `dev-only`: 1.0.0
//! - `tampered`: 1.0.0, published shasum does not match the tarball
//! - `gone`: 1.0.0, tarball URL answers 404

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use depfetch_util::hash::sha1_hex;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::net::SocketAddr;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;
use tar::Builder;
use tempfile::TempDir;

pub fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "depfetch-cli", "--bin", "depfetch", "--"]);
    cmd
}

/// Run `depfetch` against `registry` inside `project`.
pub fn run(project: &TempDir, registry: &str, args: &[&str]) -> Output {
    cargo_bin()
        .args(args)
        .arg("--cwd")
        .arg(project.path())
        .arg("--registry")
        .arg(registry)
        .output()
        .expect("Failed to run depfetch")
}

/// Parse stdout as JSON, with stderr in the panic message.
pub fn json_output(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| {
        panic!(
            "Invalid JSON output ({e}):\nstdout: {stdout}\nstderr: {}",
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

/// `name@version` ids of a JSON `packages` array.
pub fn package_ids(json: &serde_json::Value) -> Vec<String> {
    json["packages"]
        .as_array()
        .expect("packages should be an array")
        .iter()
        .map(|p| {
            format!(
                "{}@{}",
                p["name"].as_str().unwrap(),
                p["version"].as_str().unwrap()
            )
        })
        .collect()
}

/// Create a gzipped npm-style tarball (`package/` prefix).
pub fn create_test_tarball(name: &str, version: &str) -> Vec<u8> {
    let pkg_json = format!(r#"{{"name":"{name}","version":"{version}","main":"index.js"}}"#);
    let index_js = b"module.exports = 42;";

    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);

        let mut header = tar::Header::new_gnu();
        header.set_path("package/package.json").unwrap();
        header.set_size(pkg_json.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, pkg_json.as_bytes()).unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_path("package/index.js").unwrap();
        header.set_size(index_js.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &index_js[..]).unwrap();

        builder.finish().unwrap();
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

/// Published versions and their `dependencies` / `devDependencies`.
type Deps = &'static [(&'static str, &'static str)];
type Release = (&'static str, Deps, Deps);

fn releases(name: &str) -> Option<(&'static str, Vec<Release>)> {
    let releases: (&'static str, Vec<Release>) = match name {
        "a" => (
            "1.1.0",
            vec![
                ("1.0.0", &[][..], &[][..]),
                ("1.1.0", &[("b", "^2.0.0")][..], &[("dev-only", "^1.0.0")][..]),
            ],
        ),
        "b" => ("2.0.0", vec![("2.0.0", &[("c", "^3.0.0")][..], &[][..])]),
        "c" => ("3.0.0", vec![("3.0.0", &[][..], &[][..])]),
        "dev-only" | "tampered" | "gone" => ("1.0.0", vec![("1.0.0", &[][..], &[][..])]),
        _ => return None,
    };
    Some(releases)
}

fn deps_object(deps: &[(&str, &str)]) -> serde_json::Value {
    deps.iter()
        .map(|(name, range)| ((*name).to_string(), serde_json::json!(range)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

fn create_packument(base_url: &str, name: &str) -> Option<serde_json::Value> {
    let (latest, releases) = releases(name)?;

    let mut versions = serde_json::Map::new();
    for (version, deps, dev_deps) in releases {
        let tarball_name = if name == "gone" { "missing" } else { name };
        let shasum = if name == "tampered" {
            "0000000000000000000000000000000000000000".to_string()
        } else {
            sha1_hex(&create_test_tarball(name, version))
        };
        versions.insert(
            version.to_string(),
            serde_json::json!({
                "name": name,
                "version": version,
                "dependencies": deps_object(deps),
                "devDependencies": deps_object(dev_deps),
                "dist": {
                    "tarball": format!("{base_url}/{tarball_name}/-/{tarball_name}-{version}.tgz"),
                    "shasum": shasum
                }
            }),
        );
    }

    Some(serde_json::json!({
        "name": name,
        "dist-tags": { "latest": latest },
        "versions": versions
    }))
}

fn mock_registry_router(base_url: String) -> Router {
    Router::new()
        .route("/:name", get(handle_packument))
        .route("/:name/-/:tarball", get(handle_tarball))
        .with_state(base_url)
}

async fn handle_packument(Path(name): Path<String>, State(base_url): State<String>) -> Response {
    match create_packument(&base_url, &name) {
        Some(packument) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            serde_json::to_string(&packument).unwrap(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

async fn handle_tarball(Path((name, tarball)): Path<(String, String)>) -> Response {
    let version = tarball
        .strip_prefix(&format!("{name}-"))
        .and_then(|s| s.strip_suffix(".tgz"))
        .unwrap_or("");

    let published = releases(&name)
        .is_some_and(|(_, releases)| releases.iter().any(|(v, _, _)| *v == version));
    if !published {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/gzip")],
        Body::from(create_test_tarball(&name, version)),
    )
        .into_response()
}

/// Start the mock registry in a background thread and return its base URL.
pub fn start_mock_registry(ports: &AtomicU16) -> String {
    let port = ports.fetch_add(1, Ordering::SeqCst);
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let base_url = format!("http://127.0.0.1:{port}");
    let base_url_clone = base_url.clone();

    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let app = mock_registry_router(base_url_clone);
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    // Give the server time to start
    thread::sleep(Duration::from_millis(100));

    base_url
}

/// Create a project directory with a package.json.
pub fn create_test_project(deps: &[(&str, &str)], dev_deps: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();

    let mut package_json = serde_json::json!({
        "name": "test-project",
        "version": "1.0.0"
    });
    if !deps.is_empty() {
        package_json["dependencies"] = deps_object(deps);
    }
    if !dev_deps.is_empty() {
        package_json["devDependencies"] = deps_object(dev_deps);
    }

    std::fs::write(
        dir.path().join("package.json"),
        serde_json::to_string_pretty(&package_json).unwrap(),
    )
    .unwrap();

    dir
}
